//! The host boundary (§6.3): turns source text or a file path into a `Tuple`,
//! owning the import cache, the host-injected functions/globals, and the
//! provenance recorder that backs `explain_value`.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::{fs, io};

use ahash::AHashMap;

use crate::error::YamletError;
use crate::eval::{Evaluator, HostEnvironment, HostFunction, ImportResolver};
use crate::format::StringifyStyle;
use crate::materialize::compile_document;
use crate::preprocess::preprocess;
use crate::provenance::ProvenanceRecorder;
use crate::scope::Scope;
use crate::span::{Position, Span, SourceName};
use crate::tuple::Tuple;
use crate::value::Value;
use crate::yaml::parse_document;

/// A host-supplied `path -> absolute path` callback (§6.3), consulted before
/// the built-in relative-to-source-dir canonicalization so an embedding host
/// can redirect `!import` targets into its own virtual filesystem, asset
/// bundle, or search-path scheme.
pub type ImportPathResolver = Rc<dyn Fn(&str, &Span) -> Result<PathBuf, YamletError>>;

/// Builder for [`Loader`] configuration, modeled on the `ResourceLimits`
/// builder: every setter takes `mut self` and returns `Self` so options chain
/// as `LoaderOptions::new().max_depth(200).function("len", ...)`.
#[derive(Clone)]
pub struct LoaderOptions {
    functions: AHashMap<String, HostFunction>,
    globals: AHashMap<String, Value>,
    max_depth: usize,
    stringify_style: StringifyStyle,
    import_resolver: Option<ImportPathResolver>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            functions: AHashMap::new(),
            globals: AHashMap::new(),
            max_depth: 500,
            stringify_style: StringifyStyle::Terse,
            import_resolver: None,
        }
    }
}

impl LoaderOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a host callable, reachable as a bare identifier (§4.2 step 5).
    #[must_use]
    pub fn function(mut self, name: impl Into<String>, f: HostFunction) -> Self {
        self.functions.insert(name.into(), f);
        self
    }

    /// Registers a host constant, reachable as a bare identifier (§4.2 step 5).
    #[must_use]
    pub fn global(mut self, name: impl Into<String>, value: Value) -> Self {
        self.globals.insert(name.into(), value);
        self
    }

    /// Caps nested `eval` recursion (§5); guards stack overflow from runaway
    /// lambda recursion that the per-cell cycle guard can't see.
    #[must_use]
    pub fn max_depth(mut self, limit: usize) -> Self {
        self.max_depth = limit;
        self
    }

    #[must_use]
    pub fn stringify_style(mut self, style: StringifyStyle) -> Self {
        self.stringify_style = style;
        self
    }

    /// Overrides how `!import` paths resolve to a file on disk (§6.3). Tried
    /// first; if it returns an error, resolution falls back to the built-in
    /// relative-to-source-dir canonicalization rather than failing outright,
    /// so a host only needs to handle the paths it actually wants to redirect.
    #[must_use]
    pub fn import_resolver(mut self, resolver: ImportPathResolver) -> Self {
        self.import_resolver = Some(resolver);
        self
    }
}

/// Owns the import cache and host environment across however many files a
/// document's `!import` tags pull in.
///
/// `self_ref` is a `Weak` back-edge to its own `Rc` (mirroring the `Tuple`/
/// `Scope` pattern in the core): `ImportResolver::resolve_import` only
/// receives `&self`, not `Rc<Self>`, but building a fresh `HostEnvironment` for
/// an imported file's own evaluation needs an owned `Rc<Loader>` to put in
/// that environment's `imports` slot, so construction upgrades the weak
/// back-edge rather than holding a strong self-reference (which would leak).
pub struct Loader {
    functions: AHashMap<String, HostFunction>,
    globals: AHashMap<String, Value>,
    max_depth: usize,
    stringify_style: StringifyStyle,
    import_resolver: Option<ImportPathResolver>,
    cache: RefCell<AHashMap<PathBuf, Tuple>>,
    self_ref: RefCell<Weak<Loader>>,
}

impl Loader {
    pub fn new(options: LoaderOptions) -> Rc<Loader> {
        let loader = Rc::new(Loader {
            functions: options.functions,
            globals: options.globals,
            max_depth: options.max_depth,
            stringify_style: options.stringify_style,
            import_resolver: options.import_resolver,
            cache: RefCell::new(AHashMap::new()),
            self_ref: RefCell::new(Weak::new()),
        });
        *loader.self_ref.borrow_mut() = Rc::downgrade(&loader);
        loader
    }

    fn self_rc(&self) -> Rc<Loader> {
        self.self_ref
            .borrow()
            .upgrade()
            .expect("Loader always holds a strong reference to itself while it's alive")
    }

    fn host_environment(&self) -> HostEnvironment {
        HostEnvironment {
            functions: self.functions.clone(),
            globals: self.globals.clone(),
            imports: Some(self.self_rc()),
        }
    }

    /// Reads and materializes `path`, caching the result by canonicalized path.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Document, YamletError> {
        let path = path.as_ref();
        let canonical = path.canonicalize().map_err(|err| YamletError::ImportError {
            path: path.display().to_string(),
            cause: err.to_string(),
            span: Span::synthetic(),
        })?;
        tracing::debug!(path = %canonical.display(), "loading file");
        let source = fs::read_to_string(&canonical).map_err(|err| YamletError::ImportError {
            path: canonical.display().to_string(),
            cause: err.to_string(),
            span: Span::synthetic(),
        })?;
        let name: SourceName = Rc::from(canonical.to_string_lossy().as_ref());
        self.load_from_source(&source, name)
    }

    /// Parses and materializes `text` as if it lived at `logical_path`, without
    /// touching the filesystem or the import cache — `!import` tags inside it
    /// still resolve relative to `logical_path`.
    pub fn load_string(&self, text: &str, logical_path: impl Into<String>) -> Result<Document, YamletError> {
        let name: SourceName = Rc::from(logical_path.into().as_str());
        self.load_from_source(text, name)
    }

    fn load_from_source(&self, source: &str, name: SourceName) -> Result<Document, YamletError> {
        let preprocessed = preprocess(source);
        let root_node = parse_document(&preprocessed, name.clone())?;
        let expr = compile_document(&root_node)?;
        let env = self.host_environment();
        let recorder = ProvenanceRecorder::new();
        let origin = Span::new(name, Position::new(1, 1));
        let root_scope = Scope::root(origin.clone());
        let value = {
            let evaluator = Evaluator::new(&env, self.max_depth, self.stringify_style, &recorder);
            evaluator.eval(&expr, &root_scope)?
        };
        let root = value.as_tuple().cloned().ok_or_else(|| YamletError::YamlError {
            message: "document root did not evaluate to a tuple".to_owned(),
            span: origin,
        })?;
        Ok(Document {
            root,
            env,
            max_depth: self.max_depth,
            stringify_style: self.stringify_style,
            recorder,
        })
    }

    /// Resolves `path` to an absolute file. A host-supplied
    /// [`LoaderOptions::import_resolver`] is consulted first; if there is none,
    /// or it declines by returning an error, falls back to the built-in
    /// resolution relative to the directory of `span.source`, canonicalized.
    fn resolve_relative(&self, path: &str, span: &Span) -> Result<PathBuf, YamletError> {
        if let Some(resolver) = &self.import_resolver {
            if let Ok(resolved) = resolver(path, span) {
                return Ok(resolved);
            }
        }
        let requested = Path::new(path);
        let base = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            let source_path = Path::new(span.source.as_ref());
            let dir = source_path.parent().unwrap_or_else(|| Path::new("."));
            dir.join(requested)
        };
        base.canonicalize().map_err(|err: io::Error| YamletError::ImportError {
            path: path.to_owned(),
            cause: err.to_string(),
            span: span.clone(),
        })
    }
}

impl ImportResolver for Loader {
    fn resolve_import(&self, path: &str, span: &Span) -> Result<Value, YamletError> {
        let canonical = self.resolve_relative(path, span)?;
        if let Some(cached) = self.cache.borrow().get(&canonical) {
            tracing::trace!(path = %canonical.display(), "import cache hit");
            return Ok(Value::Tuple(cached.clone()));
        }
        tracing::trace!(path = %canonical.display(), "import cache miss");
        let source = fs::read_to_string(&canonical).map_err(|err| YamletError::ImportError {
            path: canonical.display().to_string(),
            cause: err.to_string(),
            span: span.clone(),
        })?;
        let name: SourceName = Rc::from(canonical.to_string_lossy().as_ref());
        let document = self.load_from_source(&source, name)?;
        self.cache.borrow_mut().insert(canonical, document.root.clone());
        Ok(Value::Tuple(document.root))
    }
}

/// One loaded document: its root tuple plus everything needed to force entries
/// and render provenance on demand (§6.3, §4.7).
pub struct Document {
    root: Tuple,
    env: HostEnvironment,
    max_depth: usize,
    stringify_style: StringifyStyle,
    recorder: ProvenanceRecorder,
}

impl Document {
    pub fn root(&self) -> &Tuple {
        &self.root
    }

    /// Forces `key` against the document's root tuple.
    pub fn get(&self, key: &str) -> Result<Value, YamletError> {
        self.force(&self.root, key)
    }

    /// Forces `key` against any tuple reached from this document, e.g. one
    /// returned by an earlier [`Document::get`] call. Nested tuples have no
    /// evaluator of their own (§3: forcing is a loader-level concern), so
    /// this is the only way to force a key below the root.
    pub fn force(&self, tuple: &Tuple, key: &str) -> Result<Value, YamletError> {
        let evaluator = Evaluator::new(&self.env, self.max_depth, self.stringify_style, &self.recorder);
        evaluator.force_tuple_key(tuple, key, tuple.origin())
    }

    /// Forces every entry, for callers that want the whole tuple materialized.
    pub fn force_all(&self) -> Result<(), YamletError> {
        for key in self.root.keys().collect::<Vec<_>>() {
            self.get(key)?;
        }
        Ok(())
    }

    /// Renders the recorded evaluation trace for `key` (§4.7). Forces `key`
    /// first if it hasn't been forced yet, so a trace always exists to render.
    pub fn explain_value(&self, key: &str) -> Result<String, YamletError> {
        self.get(key)?;
        Ok(self.recorder.explain(self.root.id(), key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_plain_mapping_from_string() {
        let loader = Loader::new(LoaderOptions::new());
        let doc = loader.load_string("a: 1\nb: two\n", "<test>").unwrap();
        assert!(matches!(doc.get("a").unwrap(), Value::Int(1)));
        assert!(matches!(doc.get("b").unwrap(), Value::Str(_)));
    }

    #[test]
    fn explain_value_renders_a_resolved_identifier() {
        let loader = Loader::new(LoaderOptions::new());
        let doc = loader.load_string("a: 1\nb: !expr a\n", "<test>").unwrap();
        let rendered = doc.explain_value("b").unwrap();
        assert!(rendered.contains("b <-"));
        assert!(rendered.contains("a resolved at"));
    }

    #[test]
    fn injected_globals_resolve_as_bare_identifiers() {
        let options = LoaderOptions::new().global("greeting", Value::from("hi"));
        let loader = Loader::new(options);
        let doc = loader.load_string("a: !expr greeting\n", "<test>").unwrap();
        match doc.get("a").unwrap() {
            Value::Str(s) => assert_eq!(&*s, "hi"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn custom_import_resolver_is_consulted_before_the_builtin_lookup() {
        let dir = std::env::temp_dir().join(format!("yamlet-loader-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let imported = dir.join("imported.yaml");
        fs::write(&imported, "value: 42\n").unwrap();

        let target = imported.clone();
        let resolver: ImportPathResolver = Rc::new(move |path, _span| {
            if path == "virtual:shared" {
                Ok(target.clone())
            } else {
                Err(YamletError::ImportError {
                    path: path.to_owned(),
                    cause: "not a virtual path".to_owned(),
                    span: Span::synthetic(),
                })
            }
        });
        let loader = Loader::new(LoaderOptions::new().import_resolver(resolver));
        let doc = loader
            .load_string("shared: !import \"virtual:shared\"\nresult: !expr \"shared.value\"\n", "<test>")
            .unwrap();
        assert!(matches!(doc.get("result").unwrap(), Value::Int(42)));

        fs::remove_dir_all(&dir).ok();
    }
}
