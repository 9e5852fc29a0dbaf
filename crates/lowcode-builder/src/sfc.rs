//! Vue single-file components.
//!
//! [`extract`] pulls out the `<script>` blocks and [`compile`] turns a
//! component into one script module. Templates are passed through as the
//! `template` option for the runtime compiler, and styles are dropped.
//! Scanning uses memchr rather than a regex so malformed input cannot blow up
//! matching time.

use memchr::memmem;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, CallExpression, Declaration, Expression, FormalParameters, ImportDeclaration,
    ImportDeclarationSpecifier, ObjectPropertyKind, Statement, TSLiteral, TSSignature, TSType,
    TSTypeName,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use rustc_hash::{FxHashMap, FxHashSet};

/// Maximum accepted component size (10 MB).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Maximum number of `<script>` tags in one component.
pub const MAX_SCRIPT_TAGS: usize = 100;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SfcError {
    #[error("component is too large: {size} bytes (max {max})")]
    FileTooLarge { size: usize, max: usize },

    #[error("too many <script> tags: {count} (max {max})")]
    TooManyScriptTags { count: usize, max: usize },

    #[error("unclosed <script> tag at byte {position}")]
    UnclosedScriptTag { position: usize },

    #[error("unclosed <template> tag at byte {position}")]
    UnclosedTemplateTag { position: usize },

    #[error("invalid {block}: {message}")]
    InvalidScript {
        block: &'static str,
        message: String,
    },

    #[error("defineOptions() cannot be combined with a default export in <script>")]
    ConflictingDefineOptions,
}

/// One `<script>` block of a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBlock<'a> {
    pub content: &'a str,
    /// Byte offset of `content` in the component source.
    pub offset: usize,
    pub setup: bool,
    pub lang: Option<&'a str>,
}

/// The script blocks of a component, at most one of each kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SfcScripts<'a> {
    pub script: Option<ScriptBlock<'a>>,
    pub script_setup: Option<ScriptBlock<'a>>,
}

impl<'a> SfcScripts<'a> {
    pub fn is_empty(&self) -> bool {
        self.script.is_none() && self.script_setup.is_none()
    }

    /// The `lang` attribute of the regular block, else of the setup block.
    pub fn declared_lang(&self) -> Option<&'a str> {
        self.script
            .as_ref()
            .and_then(|block| block.lang)
            .or_else(|| self.script_setup.as_ref().and_then(|block| block.lang))
    }

    /// Script sub-language, plain `js` when none is declared.
    pub fn lang(&self) -> &'a str {
        self.declared_lang().unwrap_or("js")
    }

    /// Extension of the module a compiled component is checked and bundled
    /// as.
    pub fn extension(&self) -> &'static str {
        match self.lang() {
            "ts" => "ts",
            "tsx" => "tsx",
            "jsx" => "jsx",
            _ => "js",
        }
    }
}

/// Extract the script blocks of a component.
///
/// A second block of the same kind replaces the first, matching how the
/// framework compiler reports duplicates as its own error.
pub fn extract(source: &str) -> Result<SfcScripts<'_>, SfcError> {
    if source.len() > MAX_FILE_SIZE {
        return Err(SfcError::FileTooLarge {
            size: source.len(),
            max: MAX_FILE_SIZE,
        });
    }

    let mut scripts = SfcScripts::default();
    let mut pointer = 0;
    let mut count = 0;

    while let Some(block) = next_script(source, &mut pointer)? {
        count += 1;
        if count > MAX_SCRIPT_TAGS {
            return Err(SfcError::TooManyScriptTags {
                count,
                max: MAX_SCRIPT_TAGS,
            });
        }

        if block.setup {
            scripts.script_setup = Some(block);
        } else {
            scripts.script = Some(block);
        }
    }

    Ok(scripts)
}

fn next_script<'a>(source: &'a str, pointer: &mut usize) -> Result<Option<ScriptBlock<'a>>, SfcError> {
    let bytes = source.as_bytes();

    loop {
        let Some(start) = find_from(bytes, *pointer, b"<script") else {
            return Ok(None);
        };
        *pointer = start + "<script".len();

        // `<scripts>` or `<scripting` are not script tags.
        if bytes
            .get(*pointer)
            .is_some_and(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/'))
        {
            continue;
        }

        if in_html_comment(bytes, start) {
            continue;
        }

        let tag_end = find_closing_angle(bytes, *pointer)
            .ok_or(SfcError::UnclosedScriptTag { position: start })?;
        let attrs = &source[*pointer..tag_end];
        let setup = has_attribute(attrs, "setup");
        let lang = lang_attribute(attrs);

        if tag_end > 0 && bytes[tag_end - 1] == b'/' {
            *pointer = tag_end + 1;
            return Ok(Some(ScriptBlock {
                content: "",
                offset: tag_end + 1,
                setup,
                lang,
            }));
        }

        let content_start = tag_end + 1;
        let content_end = find_from(bytes, content_start, b"</script>")
            .ok_or(SfcError::UnclosedScriptTag { position: start })?;
        *pointer = content_end + "</script>".len();

        return Ok(Some(ScriptBlock {
            content: &source[content_start..content_end],
            offset: content_start,
            setup,
            lang,
        }));
    }
}

fn find_from(bytes: &[u8], start: usize, needle: &[u8]) -> Option<usize> {
    memmem::find(&bytes[start..], needle).map(|pos| start + pos)
}

/// Whether `pos` sits inside an unterminated `<!-- ... -->`.
fn in_html_comment(bytes: &[u8], pos: usize) -> bool {
    let before = &bytes[..pos];
    match memmem::rfind(before, b"<!--") {
        Some(open) => memmem::find(&before[open..], b"-->").is_none(),
        None => false,
    }
}

fn find_closing_angle(bytes: &[u8], start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &byte) in bytes[start..].iter().enumerate() {
        match (byte, quote) {
            (b'"' | b'\'', None) => quote = Some(byte),
            (b, Some(q)) if b == q => quote = None,
            (b'>', None) => return Some(start + i),
            _ => {}
        }
    }
    None
}

fn has_attribute(attrs: &str, name: &str) -> bool {
    attrs
        .split(|c: char| c.is_whitespace() || c == '/')
        .any(|token| token == name || token.starts_with(&format!("{name}=")))
}

fn lang_attribute(attrs: &str) -> Option<&str> {
    let pos = attrs.find("lang=")?;
    let value = attrs[pos + "lang=".len()..].trim_start();

    match value.as_bytes().first()? {
        quote @ (b'"' | b'\'') => {
            let rest = &value[1..];
            rest.find(*quote as char).map(|end| &rest[..end])
        }
        _ => {
            let end = value
                .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
                .unwrap_or(value.len());
            Some(&value[..end])
        }
    }
}

/// Outermost `<template>` block of a component, if any.
///
/// Nested `<template>` tags (slots, conditionals) are balanced so the content
/// of the root block is returned whole.
pub fn extract_template(source: &str) -> Result<Option<&str>, SfcError> {
    let bytes = source.as_bytes();
    let mut pointer = 0;

    let Some((start, tag_end)) = next_template_open(source, &mut pointer)? else {
        return Ok(None);
    };
    if bytes[tag_end - 1] == b'/' {
        return Ok(Some(""));
    }

    let content_start = tag_end + 1;
    let mut depth = 1;
    let mut cursor = content_start;
    loop {
        let close = find_from(bytes, cursor, b"</template>")
            .ok_or(SfcError::UnclosedTemplateTag { position: start })?;

        let mut scan = cursor;
        while let Some((nested_start, nested_end)) = next_template_open(source, &mut scan)? {
            if nested_start >= close {
                break;
            }
            if bytes[nested_end - 1] != b'/' {
                depth += 1;
            }
        }

        depth -= 1;
        if depth == 0 {
            return Ok(Some(&source[content_start..close]));
        }
        cursor = close + "</template>".len();
    }
}

/// Next `<template ...>` tag at or after `pointer`: its start and the index
/// of its closing `>`.
fn next_template_open(
    source: &str,
    pointer: &mut usize,
) -> Result<Option<(usize, usize)>, SfcError> {
    let bytes = source.as_bytes();
    loop {
        let Some(start) = find_from(bytes, *pointer, b"<template") else {
            return Ok(None);
        };
        *pointer = start + "<template".len();

        if bytes
            .get(*pointer)
            .is_some_and(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/'))
        {
            continue;
        }
        if in_html_comment(bytes, start) {
            continue;
        }

        let tag_end = find_closing_angle(bytes, *pointer)
            .ok_or(SfcError::UnclosedTemplateTag { position: start })?;
        *pointer = tag_end + 1;
        return Ok(Some((start, tag_end)));
    }
}

/// Knobs of [`compile`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Hoist `defineOptions()` out of `<script setup>` into the component
    /// options.
    pub define_options: bool,
}

/// Turn a component into one script module whose default export is the
/// component options object.
///
/// Imports of both script blocks are hoisted to the top and deduplicated. The
/// setup block becomes the body of `setup()`, which returns the block's
/// top-level bindings. The `<template>` block is attached as the `template`
/// option and compiled by the runtime.
pub fn compile(source: &str, options: CompileOptions) -> Result<String, SfcError> {
    let scripts = extract(source)?;
    let template = extract_template(source)?;
    let source_type = SourceType::from_path(format!("component.{}", scripts.extension()))
        .unwrap_or_default();

    if scripts.script_setup.is_none() && template.is_none() {
        let code = match &scripts.script {
            Some(script) => script.content.to_string(),
            None => "export default {}\n".to_string(),
        };
        return Ok(code);
    }
    let typescript = matches!(scripts.extension(), "ts" | "tsx");

    let mut imports = Imports::default();
    let mut types = TypeDecls::default();
    let regular = match &scripts.script {
        Some(block) => Some(lower_regular(block.content, source_type, &mut imports, &mut types)?),
        None => None,
    };
    let setup = match &scripts.script_setup {
        Some(block) => Some(lower_setup(
            block.content,
            source_type,
            &mut imports,
            &mut types,
            options,
        )?),
        None => None,
    };

    let has_default = regular.as_ref().is_some_and(|r| r.has_default);
    if has_default && setup.as_ref().is_some_and(|s| s.options.is_some()) {
        return Err(SfcError::ConflictingDefineOptions);
    }

    let mut code = imports.lines.join("\n");
    if let Some(regular) = &regular {
        code.push_str("\n\n");
        code.push_str(regular.body.trim());
    }

    let mut sources = vec!["{}".to_string()];
    if has_default {
        sources.push(DEFAULT_BINDING.to_string());
    }
    if let Some(hoisted) = setup.as_ref().and_then(|s| s.options.clone()) {
        sources.push(hoisted);
    }

    let mut fields = Vec::new();
    if let Some(template) = template {
        fields.push(format!("  template: {},", string_literal(template.trim())));
    }
    if let Some(setup) = &setup {
        if let Some(props) = &setup.props {
            fields.push(format!("  props: {props},"));
        }
        if let Some(emits) = &setup.emits {
            fields.push(format!("  emits: {emits},"));
        }

        let mut returned: Vec<&str> = setup.bindings.iter().map(String::as_str).collect();
        for name in &imports.values {
            let used = template.is_some_and(|t| template_uses(t, name));
            // Type-only names must not reach the runtime object.
            if (used || !typescript) && !returned.contains(&name.as_str()) {
                returned.push(name);
            }
        }

        let returned = if returned.is_empty() {
            "{}".to_string()
        } else {
            format!("{{ {} }}", returned.join(", "))
        };
        let mut lines = Vec::new();
        if !setup.exposes {
            lines.push("    __expose();".to_string());
        }
        let body = indent_body(&setup.body);
        if !body.is_empty() {
            lines.push(body);
        }
        lines.push(format!("    return {returned};"));
        fields.push(format!(
            "  setup(__props, {{ emit: __emit, expose: __expose }}) {{\n{}\n  }},",
            lines.join("\n"),
        ));
    }
    sources.push(format!("{{\n{}\n}}", fields.join("\n")));

    code.push_str(&format!(
        "\n\nconst {COMPONENT_BINDING} = Object.assign({});\n\nexport default {COMPONENT_BINDING};\n",
        sources.join(", ")
    ));
    Ok(code.trim_start().to_string())
}

const DEFAULT_BINDING: &str = "__default__";
const COMPONENT_BINDING: &str = "__sfc__";

/// Hoisted import declarations, deduplicated by local binding name.
#[derive(Debug, Default)]
struct Imports {
    lines: Vec<String>,
    locals: FxHashSet<String>,
    /// Value bindings, in import order.
    values: Vec<String>,
}

impl Imports {
    fn add(&mut self, decl: &ImportDeclaration<'_>, code: &str) {
        let text = decl.span.source_text(code);
        let Some(specifiers) = &decl.specifiers else {
            if !self.lines.iter().any(|line| line == text) {
                self.lines.push(text.to_string());
            }
            return;
        };
        if specifiers.is_empty() {
            return;
        }

        let mut default = None;
        let mut namespace = None;
        let mut named = Vec::new();
        for specifier in specifiers {
            let (local, is_type) = match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                    (s.local.name.as_str(), s.import_kind.is_type())
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => (s.local.name.as_str(), false),
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                    (s.local.name.as_str(), false)
                }
            };
            if !self.locals.insert(local.to_string()) {
                continue;
            }
            if !is_type && !decl.import_kind.is_type() {
                self.values.push(local.to_string());
            }
            match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                    named.push(s.span.source_text(code).to_string());
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(_) => default = Some(local),
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(_) => {
                    namespace = Some(format!("* as {local}"));
                }
            }
        }

        let kept = usize::from(default.is_some()) + usize::from(namespace.is_some()) + named.len();
        if kept == 0 {
            return;
        }
        if kept == specifiers.len() {
            self.lines.push(text.to_string());
            return;
        }

        let mut parts: Vec<String> = Vec::new();
        parts.extend(default.map(str::to_string));
        parts.extend(namespace);
        if !named.is_empty() {
            parts.push(format!("{{ {} }}", named.join(", ")));
        }
        let kind = if decl.import_kind.is_type() { "type " } else { "" };
        self.lines.push(format!(
            "import {kind}{} from {};",
            parts.join(", "),
            decl.source.span.source_text(code)
        ));
    }
}

/// Span rewrites applied back to front.
#[derive(Debug, Default)]
struct Edits(Vec<(u32, u32, String)>);

impl Edits {
    fn replace(&mut self, span: Span, with: impl Into<String>) {
        self.0.push((span.start, span.end, with.into()));
    }

    fn remove(&mut self, span: Span) {
        self.replace(span, "");
    }

    fn apply(mut self, code: &str) -> String {
        self.0.sort_by_key(|(start, _, _)| std::cmp::Reverse(*start));
        let mut out = code.to_string();
        for (start, end, with) in self.0 {
            out.replace_range(start as usize..end as usize, &with);
        }
        out
    }
}

struct RegularBlock {
    body: String,
    has_default: bool,
}

fn lower_regular(
    code: &str,
    source_type: SourceType,
    imports: &mut Imports,
    types: &mut TypeDecls,
) -> Result<RegularBlock, SfcError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, source_type).parse();
    if let Some(error) = ret.errors.first() {
        return Err(SfcError::InvalidScript {
            block: "<script>",
            message: error.message.to_string(),
        });
    }

    let mut edits = Edits::default();
    let mut has_default = false;
    for stmt in &ret.program.body {
        collect_type_decl(stmt, types);
        match stmt {
            Statement::ImportDeclaration(decl) => {
                imports.add(decl, code);
                edits.remove(decl.span);
            }
            Statement::ExportDefaultDeclaration(decl) => {
                has_default = true;
                let value = decl.declaration.span().source_text(code);
                edits.replace(decl.span, format!("const {DEFAULT_BINDING} = {value};"));
            }
            _ => {}
        }
    }

    Ok(RegularBlock {
        body: edits.apply(code),
        has_default,
    })
}

#[derive(Debug, Default)]
struct SetupBlock {
    body: String,
    /// Top-level bindings declared in the block.
    bindings: Vec<String>,
    options: Option<String>,
    props: Option<String>,
    emits: Option<String>,
    exposes: bool,
}

fn lower_setup(
    code: &str,
    source_type: SourceType,
    imports: &mut Imports,
    types: &mut TypeDecls,
    options: CompileOptions,
) -> Result<SetupBlock, SfcError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, source_type).parse();
    if let Some(error) = ret.errors.first() {
        return Err(SfcError::InvalidScript {
            block: "<script setup>",
            message: error.message.to_string(),
        });
    }

    // Props types may be declared after the macro that uses them.
    for stmt in &ret.program.body {
        collect_type_decl(stmt, types);
    }
    let types = &*types;

    let mut block = SetupBlock::default();
    let mut edits = Edits::default();
    for stmt in &ret.program.body {
        match stmt {
            Statement::ImportDeclaration(decl) => {
                imports.add(decl, code);
                edits.remove(decl.span);
            }
            Statement::ExportNamedDeclaration(_)
            | Statement::ExportDefaultDeclaration(_)
            | Statement::ExportAllDeclaration(_) => {
                return Err(SfcError::InvalidScript {
                    block: "<script setup>",
                    message: "<script setup> cannot contain ES module exports".to_string(),
                });
            }
            Statement::ExpressionStatement(expr_stmt) => {
                let Expression::CallExpression(call) = &expr_stmt.expression else {
                    continue;
                };
                match macro_call(call, code, types, &mut block, &mut edits, options) {
                    Some(MacroUse::Remove) => edits.remove(expr_stmt.span),
                    Some(MacroUse::Replace(with)) => edits.replace(call.span, with),
                    None => {}
                }
            }
            Statement::VariableDeclaration(decl) if !decl.declare => {
                for declarator in &decl.declarations {
                    block.bindings.extend(
                        declarator
                            .id
                            .get_binding_identifiers()
                            .iter()
                            .map(|id| id.name.to_string()),
                    );
                    let Some(Expression::CallExpression(call)) = &declarator.init else {
                        continue;
                    };
                    match macro_call(call, code, types, &mut block, &mut edits, options) {
                        Some(MacroUse::Replace(with)) => edits.replace(call.span, with),
                        Some(MacroUse::Remove) => edits.replace(call.span, "undefined"),
                        None => {}
                    }
                }
            }
            Statement::FunctionDeclaration(func) => {
                block.bindings.extend(func.id.as_ref().map(|id| id.name.to_string()));
            }
            Statement::ClassDeclaration(class) if !class.declare => {
                block.bindings.extend(class.id.as_ref().map(|id| id.name.to_string()));
            }
            Statement::TSEnumDeclaration(decl) if !decl.declare => {
                block.bindings.push(decl.id.name.to_string());
            }
            _ => {}
        }
    }

    block.body = edits.apply(code);
    Ok(block)
}

enum MacroUse {
    Remove,
    Replace(String),
}

/// Lower a compiler macro call. Anything else is left alone.
fn macro_call(
    call: &CallExpression<'_>,
    code: &str,
    types: &TypeDecls,
    block: &mut SetupBlock,
    edits: &mut Edits,
    options: CompileOptions,
) -> Option<MacroUse> {
    let first_arg = || call.arguments.first().map(|arg| arg.span().source_text(code).to_string());

    if call.callee.is_specific_id("defineOptions") {
        if !options.define_options {
            return None;
        }
        block.options = Some(first_arg().unwrap_or_else(|| "{}".to_string()));
        return Some(MacroUse::Remove);
    }
    if call.callee.is_specific_id("defineProps") {
        block.props = first_arg().or_else(|| type_props(call, types, None, code));
        return Some(MacroUse::Replace("__props".to_string()));
    }
    if call.callee.is_specific_id("withDefaults") {
        if let Some(Argument::CallExpression(inner)) = call.arguments.first() {
            if inner.callee.is_specific_id("defineProps") {
                block.props = match inner.arguments.first() {
                    Some(arg) => Some(arg.span().source_text(code).to_string()),
                    None => type_props(inner, types, call.arguments.get(1), code),
                };
                return Some(MacroUse::Replace("__props".to_string()));
            }
        }
        return None;
    }
    if call.callee.is_specific_id("defineEmits") {
        block.emits = first_arg().or_else(|| type_emits(call, types));
        return Some(MacroUse::Replace("__emit".to_string()));
    }
    if call.callee.is_specific_id("defineExpose") {
        block.exposes = true;
        edits.replace(call.callee.span(), "__expose");
        return None;
    }
    None
}

/// A member of a props or emits type, reduced to what the runtime needs.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TypeMember {
    /// `size?: string`, `onClick(): void`, or a `change: [id: number]` event.
    Property {
        name: String,
        optional: bool,
        /// Runtime constructors; empty when the type has no runtime check.
        runtime: Vec<&'static str>,
    },
    /// `(e: 'change', id: number): void`.
    Call { events: Vec<String> },
}

/// Object types declared in the component's scripts, by name.
type TypeDecls = FxHashMap<String, Vec<TypeMember>>;

fn collect_type_decl(stmt: &Statement<'_>, types: &mut TypeDecls) {
    let (name, members) = match stmt {
        Statement::TSInterfaceDeclaration(decl) => {
            (decl.id.name.as_str(), Some(interface_members(decl, types)))
        }
        Statement::TSTypeAliasDeclaration(decl) => {
            (decl.id.name.as_str(), type_members(&decl.type_annotation, types))
        }
        Statement::ExportNamedDeclaration(export) => match &export.declaration {
            Some(Declaration::TSInterfaceDeclaration(decl)) => {
                (decl.id.name.as_str(), Some(interface_members(decl, types)))
            }
            Some(Declaration::TSTypeAliasDeclaration(decl)) => {
                (decl.id.name.as_str(), type_members(&decl.type_annotation, types))
            }
            _ => return,
        },
        _ => return,
    };
    if let Some(members) = members {
        types.insert(name.to_string(), members);
    }
}

/// Members of an interface, after those of the interfaces it extends.
fn interface_members(
    decl: &oxc_ast::ast::TSInterfaceDeclaration<'_>,
    types: &TypeDecls,
) -> Vec<TypeMember> {
    let mut members = Vec::new();
    for heritage in &decl.extends {
        if let Expression::Identifier(base) = &heritage.expression {
            members.extend(types.get(base.name.as_str()).cloned().unwrap_or_default());
        }
    }
    members.extend(signature_members(&decl.body.body));
    members
}

/// Members of an object type, or `None` when it cannot be resolved locally.
fn type_members(ty: &TSType<'_>, types: &TypeDecls) -> Option<Vec<TypeMember>> {
    match ty {
        TSType::TSTypeLiteral(literal) => Some(signature_members(&literal.members)),
        TSType::TSParenthesizedType(inner) => type_members(&inner.type_annotation, types),
        TSType::TSTypeReference(reference) => match &reference.type_name {
            TSTypeName::IdentifierReference(id) => types.get(id.name.as_str()).cloned(),
            _ => None,
        },
        TSType::TSIntersectionType(intersection) => {
            let mut members = Vec::new();
            for part in &intersection.types {
                members.extend(type_members(part, types)?);
            }
            Some(members)
        }
        TSType::TSFunctionType(function) => Some(vec![TypeMember::Call {
            events: event_names(&function.params),
        }]),
        _ => None,
    }
}

fn signature_members(signatures: &[TSSignature<'_>]) -> Vec<TypeMember> {
    signatures
        .iter()
        .filter_map(|signature| match signature {
            TSSignature::TSPropertySignature(prop) => Some(TypeMember::Property {
                name: prop.key.static_name()?.to_string(),
                optional: prop.optional,
                runtime: prop
                    .type_annotation
                    .as_ref()
                    .map(|annotation| runtime_types(&annotation.type_annotation))
                    .unwrap_or_default(),
            }),
            TSSignature::TSMethodSignature(method) => Some(TypeMember::Property {
                name: method.key.static_name()?.to_string(),
                optional: method.optional,
                runtime: vec!["Function"],
            }),
            TSSignature::TSCallSignatureDeclaration(call) => Some(TypeMember::Call {
                events: event_names(&call.params),
            }),
            _ => None,
        })
        .collect()
}

/// Event names from the string literal type of the first parameter.
fn event_names(params: &FormalParameters<'_>) -> Vec<String> {
    params
        .items
        .first()
        .and_then(|param| param.pattern.type_annotation.as_ref())
        .map(|annotation| string_literal_types(&annotation.type_annotation))
        .unwrap_or_default()
}

fn string_literal_types(ty: &TSType<'_>) -> Vec<String> {
    match ty {
        TSType::TSLiteralType(literal) => match &literal.literal {
            TSLiteral::StringLiteral(value) => vec![value.value.to_string()],
            _ => Vec::new(),
        },
        TSType::TSUnionType(union) => union
            .types
            .iter()
            .flat_map(|member| string_literal_types(member))
            .collect(),
        TSType::TSParenthesizedType(inner) => string_literal_types(&inner.type_annotation),
        _ => Vec::new(),
    }
}

/// Runtime constructors the framework checks a prop of type `ty` against.
fn runtime_types(ty: &TSType<'_>) -> Vec<&'static str> {
    let constructor = match ty {
        TSType::TSStringKeyword(_) | TSType::TSTemplateLiteralType(_) => "String",
        TSType::TSNumberKeyword(_) => "Number",
        TSType::TSBooleanKeyword(_) => "Boolean",
        TSType::TSBigIntKeyword(_) => "BigInt",
        TSType::TSSymbolKeyword(_) => "Symbol",
        TSType::TSObjectKeyword(_) | TSType::TSTypeLiteral(_) => "Object",
        TSType::TSArrayType(_) | TSType::TSTupleType(_) => "Array",
        TSType::TSFunctionType(_) => "Function",
        TSType::TSLiteralType(literal) => match &literal.literal {
            TSLiteral::StringLiteral(_) | TSLiteral::TemplateLiteral(_) => "String",
            TSLiteral::NumericLiteral(_) => "Number",
            TSLiteral::BooleanLiteral(_) => "Boolean",
            _ => return Vec::new(),
        },
        TSType::TSTypeReference(reference) => match &reference.type_name {
            TSTypeName::IdentifierReference(id) => match id.name.as_str() {
                "Array" | "ReadonlyArray" => "Array",
                "Function" => "Function",
                "Date" => "Date",
                "Record" | "Partial" | "Required" | "Readonly" | "Pick" | "Omit" => "Object",
                _ => return Vec::new(),
            },
            _ => return Vec::new(),
        },
        TSType::TSParenthesizedType(inner) => return runtime_types(&inner.type_annotation),
        TSType::TSUnionType(union) => {
            let mut constructors = Vec::new();
            for member in &union.types {
                if matches!(member, TSType::TSNullKeyword(_) | TSType::TSUndefinedKeyword(_)) {
                    continue;
                }
                let member_types = runtime_types(member);
                // One unchecked member makes the whole union unchecked.
                if member_types.is_empty() {
                    return Vec::new();
                }
                for constructor in member_types {
                    if !constructors.contains(&constructor) {
                        constructors.push(constructor);
                    }
                }
            }
            return constructors;
        }
        _ => return Vec::new(),
    };
    vec![constructor]
}

/// Runtime `props` option for `defineProps<T>()`, with defaults from a
/// `withDefaults()` object literal.
fn type_props(
    call: &CallExpression<'_>,
    types: &TypeDecls,
    defaults: Option<&Argument<'_>>,
    code: &str,
) -> Option<String> {
    let props_type = call.type_arguments.as_ref()?.params.first()?;
    let members = type_members(props_type, types)?;
    let defaults = defaults
        .map(|arg| default_values(arg, code))
        .unwrap_or_default();

    let props: Vec<String> = members
        .iter()
        .filter_map(|member| {
            let TypeMember::Property {
                name,
                optional,
                runtime,
            } = member
            else {
                return None;
            };
            let runtime = match runtime.as_slice() {
                [] => "null".to_string(),
                [single] => single.to_string(),
                many => format!("[{}]", many.join(", ")),
            };
            let mut prop = format!("type: {runtime}, required: {}", !*optional);
            if let Some(value) = defaults.get(name) {
                prop.push_str(&format!(", default: {value}"));
            }
            Some(format!("{}: {{ {prop} }}", object_key(name)))
        })
        .collect();

    Some(if props.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {} }}", props.join(", "))
    })
}

/// Statically keyed entries of a `withDefaults()` object literal.
fn default_values(arg: &Argument<'_>, code: &str) -> FxHashMap<String, String> {
    let Argument::ObjectExpression(object) = arg else {
        return FxHashMap::default();
    };
    object
        .properties
        .iter()
        .filter_map(|property| {
            let ObjectPropertyKind::ObjectProperty(property) = property else {
                return None;
            };
            if property.computed {
                return None;
            }
            let name = property.key.static_name()?.to_string();
            let value = if property.method {
                let key_end = property.key.span().end as usize;
                let params_and_body = code.get(key_end..property.span.end as usize)?;
                format!("function{params_and_body}")
            } else {
                property.value.span().source_text(code).to_string()
            };
            Some((name, value))
        })
        .collect()
}

/// Runtime `emits` option for `defineEmits<T>()`.
fn type_emits(call: &CallExpression<'_>, types: &TypeDecls) -> Option<String> {
    let emits_type = call.type_arguments.as_ref()?.params.first()?;
    let mut events: Vec<String> = Vec::new();
    for member in type_members(emits_type, types)? {
        let names = match member {
            TypeMember::Property { name, .. } => vec![name],
            TypeMember::Call { events } => events,
        };
        for name in names {
            if !events.contains(&name) {
                events.push(name);
            }
        }
    }
    let events: Vec<String> = events.iter().map(|event| string_literal(event)).collect();
    Some(format!("[{}]", events.join(", ")))
}

fn object_key(name: &str) -> String {
    let is_identifier = name.chars().enumerate().all(|(idx, ch)| {
        ch == '_' || ch == '$' || ch.is_ascii_alphabetic() || (idx > 0 && ch.is_ascii_digit())
    });
    if is_identifier && !name.is_empty() {
        name.to_string()
    } else {
        string_literal(name)
    }
}

/// Indent the setup block into the body of `setup()`.
///
/// Blocks with template literals or line continuations are kept as written,
/// since re-indenting would change the content of their strings.
fn indent_body(body: &str) -> String {
    let body = body.trim_end().trim_start_matches(['\r', '\n']);
    if body.contains('`') || body.contains("\\\n") {
        return body.to_string();
    }
    body.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("    {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether the template refers to `name`, directly or as a kebab-case tag.
fn template_uses(template: &str, name: &str) -> bool {
    contains_word(template, name) || contains_word(template, &hyphenate(name))
}

fn contains_word(haystack: &str, word: &str) -> bool {
    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_' || b == b'$';
    let bytes = haystack.as_bytes();
    memmem::find_iter(bytes, word.as_bytes()).any(|pos| {
        let before = pos.checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(pos + word.len()).copied();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

fn hyphenate(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (idx, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if idx > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn string_literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_regular_script() {
        let vue = r#"
<template><div>Hello</div></template>
<script>
export default { name: 'Hello' }
</script>
"#;
        let scripts = extract(vue).unwrap();
        let script = scripts.script.as_ref().unwrap();
        assert!(script.content.contains("export default"));
        assert_eq!(script.lang, None);
        assert!(scripts.script_setup.is_none());
        assert_eq!(scripts.extension(), "js");
    }

    #[test]
    fn regular_lang_wins_over_setup_lang() {
        let vue = r#"
<script lang="tsx">
export default {}
</script>
<script setup lang="ts">
const count = ref<number>(0)
</script>
"#;
        let scripts = extract(vue).unwrap();
        assert_eq!(scripts.lang(), "tsx");
        assert_eq!(scripts.extension(), "tsx");
    }

    #[test]
    fn setup_lang_used_without_regular_lang() {
        let vue = "<script setup lang='ts'>const a: number = 1</script>";
        let scripts = extract(vue).unwrap();
        assert_eq!(scripts.extension(), "ts");
    }

    #[test]
    fn unknown_lang_maps_to_js() {
        let vue = r#"<script lang="coffee">x = 1</script>"#;
        assert_eq!(extract(vue).unwrap().extension(), "js");
    }

    #[test]
    fn ignores_commented_out_scripts() {
        let vue = "<!-- <script>broken(</script> -->\n<template><p /></template>";
        assert!(extract(vue).unwrap().is_empty());
    }

    #[test]
    fn ignores_similar_tag_names() {
        let vue = "<scripts>nope</scripts><script>ok()</script>";
        let scripts = extract(vue).unwrap();
        assert_eq!(scripts.script.unwrap().content, "ok()");
    }

    #[test]
    fn unclosed_script_is_an_error() {
        let err = extract("<script>let a = 1").unwrap_err();
        assert_eq!(err, SfcError::UnclosedScriptTag { position: 0 });
    }

    #[test]
    fn oversized_component_is_rejected() {
        let large = "x".repeat(MAX_FILE_SIZE + 1);
        assert!(matches!(extract(&large), Err(SfcError::FileTooLarge { .. })));
    }

    #[test]
    fn too_many_script_tags_is_rejected() {
        let vue = "<script></script>".repeat(MAX_SCRIPT_TAGS + 1);
        assert!(matches!(
            extract(&vue),
            Err(SfcError::TooManyScriptTags { .. })
        ));
    }

    fn compile_default(source: &str) -> String {
        compile(
            source,
            CompileOptions {
                define_options: true,
            },
        )
        .unwrap()
    }

    /// Parse and run early-error checks, as the bundler would.
    fn assert_valid_module(code: &str, extension: &str) {
        let allocator = Allocator::default();
        let source_type = SourceType::from_path(format!("module.{extension}")).unwrap();
        let ret = Parser::new(&allocator, code, source_type).parse();
        assert!(ret.errors.is_empty(), "parse errors in:\n{code}\n{:?}", ret.errors);
        let semantic = oxc_semantic::SemanticBuilder::new()
            .with_check_syntax_error(true)
            .build(&ret.program);
        assert!(semantic.errors.is_empty(), "early errors in:\n{code}\n{:?}", semantic.errors);
    }

    #[test]
    fn hoists_define_options_into_component_options() {
        let vue = r#"<script setup lang="ts">
defineOptions({ name: 'LcButton' })
const size = 'small'
</script>"#;
        let code = compile_default(vue);
        assert!(!code.contains("defineOptions"));
        assert!(code.contains("const __sfc__ = Object.assign({}, { name: 'LcButton' }, {"));
        assert!(code.contains("const size = 'small'"));
        assert!(code.contains("return { size };"));
        assert!(code.ends_with("export default __sfc__;\n"));
        assert_valid_module(&code, "ts");
    }

    #[test]
    fn define_options_left_alone_when_disabled() {
        let vue = "<script setup>defineOptions({ name: 'A' })</script>";
        let code = compile(vue, CompileOptions::default()).unwrap();
        assert!(code.contains("defineOptions({ name: 'A' })"));
    }

    #[test]
    fn define_options_conflicts_with_default_export() {
        let vue = r#"<script>export default { name: 'A' }</script>
<script setup>defineOptions({ name: 'B' })</script>"#;
        assert_eq!(
            compile(vue, CompileOptions { define_options: true }).unwrap_err(),
            SfcError::ConflictingDefineOptions
        );
    }

    #[test]
    fn imports_shared_by_both_blocks_are_declared_once() {
        let vue = r#"<script lang="ts">
import { defineComponent } from 'vue'
export default defineComponent({ inheritAttrs: false })
</script>
<script setup lang="ts">
import { defineComponent, ref } from 'vue'
const count = ref(0)
</script>"#;
        let code = compile_default(vue);

        assert!(code.starts_with("import { defineComponent } from 'vue'\nimport { ref } from 'vue';"));
        assert_eq!(code.matches("import").count(), 2);
        assert!(code.contains("const __default__ = defineComponent({ inheritAttrs: false });"));
        assert!(code.contains("Object.assign({}, __default__, {"));
        assert_valid_module(&code, "ts");
    }

    #[test]
    fn setup_bindings_are_returned_to_the_template() {
        let vue = r#"<template><button @click="inc">{{ count }}</button></template>
<script setup>
import { ref } from 'vue'
const count = ref(0)
function inc() { count.value++ }
</script>"#;
        let code = compile_default(vue);

        assert!(code.contains(r#"template: "<button @click=\"inc\">{{ count }}</button>","#));
        assert!(code.contains("setup(__props, { emit: __emit, expose: __expose }) {"));
        assert!(code.contains("    __expose();\n"));
        assert!(code.contains("return { count, inc, ref };"));
        assert_valid_module(&code, "js");
    }

    #[test]
    fn typescript_imports_are_returned_only_when_the_template_uses_them() {
        let vue = r#"<template><my-icon /><span>{{ count }}</span></template>
<script setup lang="ts">
import { ref, type Ref } from 'vue'
import MyIcon from './MyIcon.vue'
import { helper } from './helper'
const count: Ref<number> = ref(helper())
</script>"#;
        let code = compile_default(vue);
        assert!(code.contains("return { count, MyIcon };"));
        assert_valid_module(&code, "ts");
    }

    #[test]
    fn props_and_emits_macros_become_options() {
        let vue = r#"<script setup>
const props = defineProps({ size: String })
const emit = defineEmits(['click'])
const onClick = () => emit('click', props.size)
</script>"#;
        let code = compile_default(vue);

        assert!(code.contains("  props: { size: String },"));
        assert!(code.contains("  emits: ['click'],"));
        assert!(code.contains("const props = __props"));
        assert!(code.contains("const emit = __emit"));
        assert!(code.contains("return { props, emit, onClick };"));
        assert_valid_module(&code, "js");
    }

    #[test]
    fn define_expose_uses_setup_context() {
        let vue = "<script setup>
const focus = () => {}
defineExpose({ focus })
</script>";
        let code = compile_default(vue);
        assert!(code.contains("__expose({ focus })"));
        assert!(!code.contains("__expose();"));
    }

    #[test]
    fn type_only_props_become_runtime_props() {
        let vue = r#"<script setup lang="ts">
const props = defineProps<{ size?: 'sm' | 'md'; disabled: boolean; 'aria-label'?: string | null; meta?: Config }>()
</script>"#;
        let code = compile_default(vue);

        assert!(code.contains(
            "  props: { size: { type: String, required: false }, \
             disabled: { type: Boolean, required: true }, \
             \"aria-label\": { type: String, required: false }, \
             meta: { type: null, required: false } },"
        ));
        assert!(code.contains("const props = __props"));
        assert_valid_module(&code, "ts");
    }

    #[test]
    fn with_defaults_fills_in_prop_defaults() {
        let vue = r#"<script lang="ts">
interface Base { disabled?: boolean }
export interface ButtonProps extends Base {
  size?: string
  items?: number[]
  format?: (value: number) => string
  onClick?(): void
}
</script>
<script setup lang="ts">
const props = withDefaults(defineProps<ButtonProps>(), {
  size: 'md',
  items: () => [1, 2],
  format(value: number) { return String(value) },
})
</script>"#;
        let code = compile_default(vue);

        assert!(code.contains("disabled: { type: Boolean, required: false }"));
        assert!(code.contains("size: { type: String, required: false, default: 'md' }"));
        assert!(code.contains("items: { type: Array, required: false, default: () => [1, 2] }"));
        assert!(code.contains(
            "format: { type: Function, required: false, default: function(value: number) { return String(value) } }"
        ));
        assert!(code.contains("onClick: { type: Function, required: false }"));
        assert!(!code.contains("withDefaults"));
        assert!(code.contains("const props = __props"));
        assert_valid_module(&code, "ts");
    }

    #[test]
    fn props_type_declared_after_the_macro_is_resolved() {
        let vue = r#"<script setup lang="ts">
const props = defineProps<Props>()
type Props = { label: string } & { count?: number }
</script>"#;
        let code = compile_default(vue);
        assert!(code.contains(
            "  props: { label: { type: String, required: true }, count: { type: Number, required: false } },"
        ));
        assert_valid_module(&code, "ts");
    }

    #[test]
    fn type_only_emits_list_event_names() {
        let vue = r#"<script setup lang="ts">
const emit = defineEmits<{ (e: 'change', id: number): void; (e: 'update' | 'change'): void }>()
</script>"#;
        let code = compile_default(vue);
        assert!(code.contains("  emits: [\"change\", \"update\"],"));
        assert!(code.contains("const emit = __emit"));
        assert_valid_module(&code, "ts");

        let vue = r#"<script setup lang="ts">
const emit = defineEmits<{ change: [id: number]; close: [] }>()
</script>"#;
        let code = compile_default(vue);
        assert!(code.contains("  emits: [\"change\", \"close\"],"));
        assert_valid_module(&code, "ts");
    }

    #[test]
    fn setup_body_is_indented() {
        let vue = "<script setup>
import { ref } from 'vue'
const count = ref(0)

function inc() {
  count.value++
}
</script>";
        let code = compile_default(vue);
        assert!(code.contains(
            "    __expose();\n    const count = ref(0)\n\n    function inc() {\n      count.value++\n    }\n    return {"
        ));
        assert_valid_module(&code, "js");
    }

    #[test]
    fn setup_body_with_multiline_strings_is_kept_verbatim() {
        let vue = "<script setup>
const banner = `line one
line two`
</script>";
        let code = compile_default(vue);
        assert!(code.contains("const banner = `line one\nline two`\n    return { banner };"));
        assert_valid_module(&code, "js");
    }

    #[test]
    fn exports_in_setup_are_rejected() {
        let vue = "<script setup>export const a = 1</script>";
        assert!(matches!(
            compile(vue, CompileOptions::default()),
            Err(SfcError::InvalidScript { block: "<script setup>", .. })
        ));
    }

    #[test]
    fn template_only_component_gets_options_object() {
        let code = compile_default("<template>\n  <p>hi</p>\n</template>");
        assert_eq!(
            code,
            "const __sfc__ = Object.assign({}, {\n  template: \"<p>hi</p>\",\n});\n\nexport default __sfc__;\n"
        );
    }

    #[test]
    fn regular_script_without_template_is_kept() {
        let vue = "<script>export default { name: 'Plain' }</script>";
        assert_eq!(compile_default(vue), "export default { name: 'Plain' }");
    }

    #[test]
    fn nested_templates_are_balanced() {
        let vue = r#"<template><div><template v-if="a"><b /></template><template #x /></div></template>
<script>const a = "<template>"</script>"#;
        assert_eq!(
            extract_template(vue).unwrap(),
            Some(r#"<div><template v-if="a"><b /></template><template #x /></div>"#)
        );
    }

    #[test]
    fn unclosed_template_is_an_error() {
        assert_eq!(
            extract_template("<template><div>").unwrap_err(),
            SfcError::UnclosedTemplateTag { position: 0 }
        );
    }
}
