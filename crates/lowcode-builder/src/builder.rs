//! Build driver.
//!
//! [`Builder`] runs a one-shot production build. [`DevBuild`] produces the
//! in-memory bundle served by `lowcode start`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use lowcode_config::{PackageManifest, TargetFormat};
use tracing::{debug, info};

use crate::assets::{AssetUrls, AssetsManifest};
use crate::bundler::{Bundler, EmittedFile};
use crate::config::{BundleTask, Command, ConfigAssembler};
use crate::{ResolvedOptions, Result, check};

/// Outcome of a successful build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Every file written, bundles first, then declarations and the assets
    /// manifest.
    pub written: Vec<PathBuf>,
    pub duration: Duration,
}

/// One-shot build of every requested format.
pub struct Builder<B> {
    options: ResolvedOptions,
    bundler: B,
}

impl<B: Bundler> Builder<B> {
    pub fn new(options: ResolvedOptions, bundler: B) -> Self {
        Self { options, bundler }
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    pub fn bundler(&self) -> &B {
        &self.bundler
    }

    /// Check, bundle, then emit declarations and the assets manifest.
    ///
    /// Nothing is bundled when the check fails. A failing task does not undo
    /// files other tasks already wrote.
    pub async fn build(&self) -> Result<BuildReport> {
        let started = Instant::now();
        let options = &self.options;

        let project = check(&options.context).await?;

        let tasks = ConfigAssembler::new(options, Command::Build)
            .assemble()
            .await?;
        let bundled = try_join_all(tasks.iter().map(|task| self.run_task(task))).await?;
        let mut written: Vec<PathBuf> = bundled.into_iter().flatten().collect();

        let src_dir = options.src_dir();
        if options.wants(TargetFormat::Cjs) {
            let lib = options.context.join("lib");
            written.extend(project.emit_declarations(&src_dir, &lib).await?);
        }
        if options.wants(TargetFormat::Esm) {
            let es = options.context.join("es");
            written.extend(project.emit_declarations(&src_dir, &es).await?);
        }

        if options.wants(TargetFormat::Umd) {
            if let Some(assets) = AssetsManifest::for_build(options)? {
                written.push(assets.write(&options.out_dir).await?);
            }
        }

        let duration = started.elapsed();
        info!(
            files = written.len(),
            duration_ms = duration.as_millis() as u64,
            "build finished"
        );
        Ok(BuildReport { written, duration })
    }

    async fn run_task(&self, task: &BundleTask) -> Result<Vec<PathBuf>> {
        let targets = task.config.targets();
        info!(task = %task.label, targets = targets.len(), "bundling");

        let written = try_join_all(
            targets
                .into_iter()
                .map(|target| self.bundler.write(&task.config, target)),
        )
        .await?;

        let written: Vec<PathBuf> = written.into_iter().flatten().collect();
        debug!(task = %task.label, files = written.len(), "task finished");
        Ok(written)
    }
}

/// Watch-mode bundle, kept in memory.
pub struct DevBuild<B> {
    options: ResolvedOptions,
    bundler: B,
}

impl<B: Bundler> DevBuild<B> {
    pub fn new(options: ResolvedOptions, bundler: B) -> Self {
        Self { options, bundler }
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    pub fn bundler(&self) -> &B {
        &self.bundler
    }

    /// Regenerate the entries and bundle every dev task.
    ///
    /// Returned file names are relative to the dev directory, e.g.
    /// `index.js` and `meta.js`.
    pub async fn rebuild(&self) -> Result<Vec<EmittedFile>> {
        let started = Instant::now();
        let tasks = ConfigAssembler::new(&self.options, Command::Start)
            .dev()
            .await?;

        let runs = tasks.iter().flat_map(|task| {
            task.config
                .targets()
                .into_iter()
                .map(move |target| self.bundler.generate(&task.config, target))
        });
        let outputs = try_join_all(runs).await?;
        let files: Vec<EmittedFile> = outputs.into_iter().flatten().collect();

        info!(
            files = files.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "dev bundle ready"
        );
        Ok(files)
    }

    /// Assets manifest pointing at the dev server at `origin`, or `None`
    /// when the project has no package manifest.
    pub fn assets(&self, origin: &str) -> Result<Option<AssetsManifest>> {
        let Some(manifest) = PackageManifest::find(&self.options.context)? else {
            return Ok(None);
        };
        let urls = AssetUrls::dev_server(origin);
        Ok(Some(AssetsManifest::build(&self.options, &manifest, &urls)))
    }
}
