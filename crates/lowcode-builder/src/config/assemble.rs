//! Format-specific bundle configurations.

use std::path::PathBuf;

use indexmap::IndexMap;
use lowcode_config::{PackageManifest, ResolvedOptions, TargetFormat};
use tracing::debug;

use super::{
    BundleConfig, BundleInput, BundleTask, ExportsMode, ExternalPattern, ModuleFormat,
    OutputTarget, OutputTargets, PluginSpec, SourcemapMode, merge_all,
};
use crate::Result;
use crate::discover::{discover_meta_files, library_inputs};
use crate::entry::{generate_meta_entry, generate_view_entry};

const RESOLVE_EXTENSIONS: [&str; 4] = [".mjs", ".js", ".json", ".ts"];

/// The command being run. It decides the default production flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Build,
    Start,
}

/// Builds [`BundleConfig`]s from resolved options.
pub struct ConfigAssembler<'a> {
    options: &'a ResolvedOptions,
    command: Command,
}

impl<'a> ConfigAssembler<'a> {
    pub fn new(options: &'a ResolvedOptions, command: Command) -> Self {
        Self { options, command }
    }

    fn production(&self) -> bool {
        self.command == Command::Build
    }

    /// Plugin chain shared by every configuration.
    pub fn base(&self, production: bool) -> BundleConfig {
        let extensions: Vec<String> = RESOLVE_EXTENSIONS.iter().map(|e| e.to_string()).collect();
        let node_env = if production { "production" } else { "development" };

        BundleConfig {
            cwd: self.options.context.clone(),
            plugins: vec![
                PluginSpec::DefineOptions,
                PluginSpec::VueSfc { production },
                PluginSpec::VueJsx,
                PluginSpec::NodeResolve {
                    extensions: extensions.clone(),
                },
                PluginSpec::CommonJs,
                PluginSpec::Transpile {
                    target: "es2018".into(),
                    sourcemap: true,
                    loaders: IndexMap::from([(".vue".to_string(), "ts".to_string())]),
                },
                PluginSpec::Babel {
                    extensions,
                    bundled_helpers: true,
                },
                PluginSpec::Replace {
                    values: IndexMap::from([
                        ("__VUE_OPTIONS_API__".to_string(), "true".to_string()),
                        ("__VUE_PROD_DEVTOOLS__".to_string(), "false".to_string()),
                        ("process.env.NODE_ENV".to_string(), format!("\"{node_env}\"")),
                    ]),
                    prevent_assignment: true,
                },
            ],
            ..Default::default()
        }
    }

    fn externals(&self) -> Vec<ExternalPattern> {
        self.options
            .externals
            .keys()
            .map(ExternalPattern::prefix)
            .collect()
    }

    /// Per-module cjs and/or esm build into `lib/` and `es/`.
    ///
    /// Dependencies and peer dependencies of the package stay external.
    pub fn library(&self) -> Result<BundleTask> {
        let context = &self.options.context;
        let manifest = PackageManifest::load(context)?;
        let src_dir = self.options.src_dir();

        let mut outputs = Vec::new();
        if self.options.wants(TargetFormat::Cjs) {
            outputs.push(
                OutputTarget::dir(context.join("lib"))
                    .format(ModuleFormat::Cjs)
                    .exports(ExportsMode::Named)
                    .entry_file_names("[name].js")
                    .preserve_modules(&src_dir),
            );
        }
        if self.options.wants(TargetFormat::Esm) {
            outputs.push(
                OutputTarget::dir(context.join("es"))
                    .format(ModuleFormat::Esm)
                    .entry_file_names("[name].mjs")
                    .preserve_modules(&src_dir),
            );
        }

        let inputs = library_inputs(&src_dir);
        debug!(inputs = inputs.len(), "library inputs collected");

        let layer = BundleConfig {
            input: Some(BundleInput::Files(inputs)),
            external: manifest
                .external_names()
                .map(ExternalPattern::prefix)
                .collect(),
            output: Some(OutputTargets::List(outputs)),
            ..Default::default()
        };
        Ok(BundleTask::new(
            "library",
            merge_all(self.base(self.production()), [layer]),
        ))
    }

    /// Development and minified production UMD bundles of `src/index.ts`.
    pub fn umd(&self) -> Vec<BundleTask> {
        let out_dir = &self.options.out_dir;
        let umd = BundleConfig {
            input: Some(BundleInput::Entry(self.options.src_dir().join("index.ts"))),
            external: self.externals(),
            treeshake: Some(true),
            output: Some(OutputTargets::Single(
                OutputTarget::default()
                    .name(&self.options.library)
                    .format(ModuleFormat::Umd)
                    .globals(self.options.externals.clone()),
            )),
            ..Default::default()
        };

        let development = merge_all(
            self.base(false),
            [
                umd.clone(),
                BundleConfig {
                    output: Some(OutputTargets::Single(
                        OutputTarget::file(out_dir.join("dist/index.js"))
                            .sourcemap(SourcemapMode::Inline),
                    )),
                    ..Default::default()
                },
            ],
        );
        let production = merge_all(
            self.base(true),
            [
                umd,
                BundleConfig {
                    plugins: vec![PluginSpec::Minify],
                    output: Some(OutputTargets::Single(OutputTarget::file(
                        out_dir.join("dist/index.prod.js"),
                    ))),
                    ..Default::default()
                },
            ],
        );

        vec![
            BundleTask::new("umd:development", development),
            BundleTask::new("umd:production", production),
        ]
    }

    /// Minified UMD bundle of the component metadata, `dist/meta.js`.
    ///
    /// Writes the metadata entry into the scratch directory.
    pub async fn meta(&self) -> Result<BundleTask> {
        let lowcode = &self.options.lowcode;
        let files = discover_meta_files(&lowcode.meta_dir);
        let entry =
            generate_meta_entry(&self.options.scratch_dir(), &files, &lowcode.npm_info, None).await?;

        let layer = BundleConfig {
            input: Some(BundleInput::Entry(entry)),
            plugins: vec![PluginSpec::Minify],
            output: Some(OutputTargets::Single(
                OutputTarget::file(self.options.out_dir.join("dist/meta.js"))
                    .name(self.options.meta_library())
                    .format(ModuleFormat::Umd),
            )),
            ..Default::default()
        };
        Ok(BundleTask::new(
            "meta",
            merge_all(self.base(self.production()), [layer]),
        ))
    }

    /// Watch-mode tasks: the view and meta entries, each registered on
    /// `window` and bundled as its own iife into the dev directory.
    ///
    /// An iife bundle has exactly one entry, so the two entries are separate
    /// tasks writing `index.js` and `meta.js`.
    pub async fn dev(&self) -> Result<Vec<BundleTask>> {
        let options = self.options;
        let scratch = options.scratch_dir();
        let meta_library = options.meta_library();
        let files = discover_meta_files(&options.lowcode.meta_dir);

        let view = generate_view_entry(
            &scratch,
            &options.src_dir().join("index.ts"),
            Some(options.library.as_str()),
        )
        .await?;
        let meta = generate_meta_entry(
            &scratch,
            &files,
            &options.lowcode.npm_info,
            Some(meta_library.as_str()),
        )
        .await?;

        let dev_dir = options.dev_dir();
        let task = |label: &str, entry: PathBuf, file: &str, name: &str| {
            let layer = BundleConfig {
                input: Some(BundleInput::Entry(entry)),
                plugins: vec![
                    PluginSpec::DevServer {
                        dir: dev_dir.clone(),
                    },
                    PluginSpec::Iife { sourcemap: true },
                ],
                external: self.externals(),
                treeshake: Some(true),
                output: Some(OutputTargets::Single(
                    OutputTarget::file(dev_dir.join(file))
                        .name(name)
                        .globals(options.externals.clone())
                        .format(ModuleFormat::Iife),
                )),
                ..Default::default()
            };
            BundleTask::new(label, merge_all(self.base(self.production()), [layer]))
        };

        Ok(vec![
            task("dev:index", view, "index.js", options.library.as_str()),
            task("dev:meta", meta, "meta.js", meta_library.as_str()),
        ])
    }

    /// Every task of a one-shot build, in execution order.
    pub async fn assemble(&self) -> Result<Vec<BundleTask>> {
        let mut tasks = Vec::new();

        if self.options.wants(TargetFormat::Cjs) || self.options.wants(TargetFormat::Esm) {
            tasks.push(self.library()?);
        }
        if self.options.wants(TargetFormat::Umd) {
            tasks.extend(self.umd());
            tasks.push(self.meta().await?);
        }

        debug!(
            tasks = ?tasks.iter().map(|t| t.label.as_str()).collect::<Vec<_>>(),
            "bundle tasks assembled"
        );
        Ok(tasks)
    }
}
