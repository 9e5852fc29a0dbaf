//! Rolldown plugins backing the declarative plugin chain.

use std::borrow::Cow;
use std::path::Path;

use anyhow::Context;
use rolldown_common::{ModuleType, ResolvedExternal};
use rolldown_plugin::{
    HookLoadArgs, HookLoadOutput, HookLoadReturn, HookResolveIdArgs, HookResolveIdOutput,
    HookResolveIdReturn, HookUsage, Plugin, PluginContext, PluginContextResolveOptions,
};

use crate::config::ExternalPattern;
use crate::sfc;

/// Marks bare imports matching any prefix pattern as external.
#[derive(Debug, Clone)]
pub struct ExternalPlugin {
    patterns: Vec<ExternalPattern>,
}

impl ExternalPlugin {
    pub fn new(patterns: Vec<ExternalPattern>) -> Self {
        Self { patterns }
    }

    pub fn is_external(&self, specifier: &str) -> bool {
        let relative = specifier.starts_with('.') || specifier.starts_with('/');
        !relative && self.patterns.iter().any(|p| p.matches(specifier))
    }
}

impl Plugin for ExternalPlugin {
    fn name(&self) -> Cow<'static, str> {
        "lowcode:externals".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::ResolveId
    }

    fn resolve_id(
        &self,
        _ctx: &PluginContext,
        args: &HookResolveIdArgs,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let specifier = args.specifier.to_string();
        let external = self.is_external(&specifier);

        async move {
            if !external {
                return Ok(None);
            }
            Ok(Some(HookResolveIdOutput {
                id: specifier.into(),
                external: Some(ResolvedExternal::Bool(true)),
                ..Default::default()
            }))
        }
    }
}

/// Loads `.vue` files as compiled component modules.
///
/// Components are resolved to a `<file>.vue.<ext>` id. The script extension
/// is what rolldown strips when naming preserved modules, so the component
/// is written as `Button.vue.js` next to any `Button.js` of the same name.
#[derive(Debug, Clone)]
pub struct VuePlugin {
    /// Module type for components that declare no `lang`.
    default_module_type: ModuleType,
    define_options: bool,
}

impl VuePlugin {
    pub fn new(default_lang: &str, define_options: bool) -> Self {
        Self {
            default_module_type: module_type(default_lang),
            define_options,
        }
    }

    fn module_type_of(&self, scripts: &sfc::SfcScripts<'_>) -> ModuleType {
        scripts
            .declared_lang()
            .map(module_type)
            .unwrap_or_else(|| self.default_module_type.clone())
    }
}

impl Plugin for VuePlugin {
    fn name(&self) -> Cow<'static, str> {
        "lowcode:vue".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::ResolveId | HookUsage::Load
    }

    fn resolve_id(
        &self,
        ctx: &PluginContext,
        args: &HookResolveIdArgs,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let ctx = ctx.clone();
        let plugin = self.clone();
        let specifier = args.specifier.to_string();
        let importer = args.importer.map(str::to_string);
        let import_kind = args.kind;
        let is_entry = args.is_entry;
        let local = is_entry || specifier.starts_with('.') || specifier.starts_with('/');

        async move {
            if !local {
                return Ok(None);
            }

            let resolve_options = PluginContextResolveOptions {
                import_kind,
                is_entry,
                skip_self: true,
                ..Default::default()
            };
            let Ok(resolved) = ctx
                .resolve(&specifier, importer.as_deref(), Some(resolve_options))
                .await?
            else {
                return Ok(None);
            };
            if !resolved.id.ends_with(".vue") {
                return Ok(None);
            }

            let source = tokio::fs::read_to_string(resolved.id.as_str())
                .await
                .with_context(|| format!("Failed to read Vue file: {}", resolved.id))?;
            let scripts = sfc::extract(&source)
                .with_context(|| format!("Failed to parse Vue file: {}", resolved.id))?;
            let id = component_id(&resolved.id, &plugin.module_type_of(&scripts));

            Ok(Some(HookResolveIdOutput {
                id: id.into(),
                ..Default::default()
            }))
        }
    }

    fn load(
        &self,
        _ctx: &PluginContext,
        args: &HookLoadArgs<'_>,
    ) -> impl std::future::Future<Output = HookLoadReturn> + Send {
        let id = args.id.to_string();
        let plugin = self.clone();

        async move {
            let Some(path) = component_path(&id) else {
                return Ok(None);
            };

            let source = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read Vue file: {path}"))?;
            let scripts =
                sfc::extract(&source).with_context(|| format!("Failed to parse Vue file: {path}"))?;
            let module_type = plugin.module_type_of(&scripts);

            let options = sfc::CompileOptions {
                define_options: plugin.define_options,
            };
            let code = sfc::compile(&source, options)
                .with_context(|| format!("Failed to compile Vue file: {path}"))?;

            Ok(Some(HookLoadOutput {
                code: code.into(),
                module_type: Some(module_type),
                ..Default::default()
            }))
        }
    }
}

/// `/src/Button.vue` loaded as `module_type` becomes `/src/Button.vue.ts`.
fn component_id(path: &str, module_type: &ModuleType) -> String {
    let ext = match module_type {
        ModuleType::Ts => "ts",
        ModuleType::Tsx => "tsx",
        ModuleType::Jsx => "jsx",
        _ => "js",
    };
    format!("{path}.{ext}")
}

/// The component file behind a module id, for `.vue` files and the
/// `<file>.vue.<ext>` ids this plugin resolves them to.
///
/// A real file named like a component id is left to rolldown.
fn component_path(id: &str) -> Option<&str> {
    if id.ends_with(".vue") {
        return Some(id);
    }
    let (path, ext) = id.rsplit_once('.')?;
    let virtual_id = path.ends_with(".vue") && matches!(ext, "js" | "ts" | "jsx" | "tsx");
    (virtual_id && !Path::new(id).is_file()).then_some(path)
}

fn module_type(lang: &str) -> ModuleType {
    match lang {
        "ts" | "typescript" => ModuleType::Ts,
        "tsx" => ModuleType::Tsx,
        "jsx" => ModuleType::Jsx,
        _ => ModuleType::Js,
    }
}
