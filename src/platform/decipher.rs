//! Signature decipher engine
//!
//! Finds the signature transform function (and the helper object it calls)
//! inside a player script by structural pattern search, then runs it as a
//! black box inside a [`ScriptSandbox`].

use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ResolveError;
use crate::platform::cipher::SignatureTransform;
use crate::platform::sandbox::ScriptSandbox;

/// Identifier characters used in minified scripts
const IDENT: &str = r"[a-zA-Z0-9$_]+";

/// Boundary before an identifier (no lookbehind in `regex`)
const BOUNDARY: &str = r"(?:^|[^a-zA-Z0-9$_.])";

/// Brace block tolerating one level of nesting; group captures the inside
const BLOCK: &str = r"\{([^{}]*(?:\{[^{}]*\}[^{}]*)*)\}";

/// Receivers that are never a helper object
const BUILTIN_RECEIVERS: &[&str] = &["String", "Math", "Array", "Object", "Number", "JSON"];

/// Lifecycle of a decipher engine for one script version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecipherState {
    Uninitialized,
    ScriptFetched,
    FunctionExtracted,
    Initialized,
    /// Extraction failed; terminal for this script version
    Unusable,
}

impl fmt::Display for DecipherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecipherState::Uninitialized => "uninitialized",
            DecipherState::ScriptFetched => "script fetched",
            DecipherState::FunctionExtracted => "function extracted",
            DecipherState::Initialized => "initialized",
            DecipherState::Unusable => "unusable",
        };
        f.write_str(name)
    }
}

/// Transform sources extracted from one player script version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecipherOperations {
    pub main_function_name: String,
    /// Standalone `function NAME(a){...}` declaration
    pub main_function_source: String,
    pub helper_object_name: Option<String>,
    /// `var NAME={...};` declaration
    pub helper_object_source: Option<String>,
}

impl DecipherOperations {
    /// Check if the operations carry a callable main function
    pub fn is_initialized(&self) -> bool {
        !self.main_function_name.is_empty() && !self.main_function_source.is_empty()
    }
}

/// Strategy that pulls the transform function out of a player script
pub trait TransformExtractor: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    fn extract(&self, script: &str) -> Result<DecipherOperations, ResolveError>;
}

/// Declaration shapes a transform function can take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionForm {
    /// `NAME = function(a){...}`
    Assignment,
    /// `function NAME(a){...}`
    Declaration,
    /// `NAME: function(a){...}`
    Property,
}

impl FunctionForm {
    const ALL: [FunctionForm; 3] = [
        FunctionForm::Assignment,
        FunctionForm::Declaration,
        FunctionForm::Property,
    ];

    /// Pattern prefix up to and including `function` and the opening paren,
    /// with `name` already escaped
    fn head(self, name: &str) -> String {
        match self {
            FunctionForm::Assignment => format!(r"{}{}\s*=\s*function\s*\(", BOUNDARY, name),
            FunctionForm::Declaration => format!(r"function\s+{}\s*\(", name),
            FunctionForm::Property => format!(r"{}{}\s*:\s*function\s*\(", BOUNDARY, name),
        }
    }
}

/// One compiled pattern per function form, matching a head whose body opens
/// by splitting an argument into characters
fn split_opening_regexes() -> Result<&'static [(FunctionForm, Regex)], ResolveError> {
    static REGEXES: OnceLock<Result<Vec<(FunctionForm, Regex)>, regex::Error>> = OnceLock::new();

    REGEXES
        .get_or_init(|| {
            let split_opening = format!(
                r#"\s*\(\s*({ident})\s*\)\s*\{{\s*({ident})\s*=\s*({ident})\.split\(\s*(?:""|'')\s*\)"#,
                ident = IDENT
            );
            FunctionForm::ALL
                .into_iter()
                .map(|form| {
                    let head = form.head(&format!("({})", IDENT));
                    // head ends with `\(`; split_opening starts its own
                    let head = head.trim_end_matches(r"\(");
                    Regex::new(&format!("{}{}", head, split_opening)).map(|regex| (form, regex))
                })
                .collect()
        })
        .as_deref()
        .map_err(|e| ResolveError::RegexError(e.clone()))
}

/// Dotted call `receiver.method(`
fn helper_call_regex() -> Result<&'static Regex, ResolveError> {
    static REGEX: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

    REGEX
        .get_or_init(|| Regex::new(&format!(r"{}({})\.({})\s*\(", BOUNDARY, IDENT, IDENT)))
        .as_ref()
        .map_err(|e| ResolveError::RegexError(e.clone()))
}

/// Pattern-based extractor; no JavaScript parser involved
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexTransformExtractor;

impl RegexTransformExtractor {
    /// Find the transform function name and its parameter.
    ///
    /// The body has to open by splitting its only argument into characters,
    /// e.g. `a=a.split("")`.
    fn locate_main_function(&self, script: &str) -> Result<(String, String, FunctionForm), ResolveError> {
        for (form, regex) in split_opening_regexes()? {
            for caps in regex.captures_iter(script) {
                let (name, param, assignee, target) = (&caps[1], &caps[2], &caps[3], &caps[4]);
                if param == assignee && param == target {
                    debug!("Transform function candidate {} ({:?} form)", name, form);
                    return Ok((name.to_string(), param.to_string(), *form));
                }
            }
        }

        Err(ResolveError::PatternNotFound(
            "no function splitting its argument into characters".to_string(),
        ))
    }

    /// Cut out the function's parameter list and body and normalize it into
    /// a standalone declaration
    fn extract_function_source(
        &self,
        script: &str,
        name: &str,
        preferred: FunctionForm,
    ) -> Result<(String, String), ResolveError> {
        let escaped = regex::escape(name);
        let ordered = std::iter::once(preferred)
            .chain(FunctionForm::ALL.into_iter().filter(|f| *f != preferred));

        for form in ordered {
            let regex = Regex::new(&format!(
                r"{}([^)]*)\)\s*{}",
                form.head(&escaped),
                BLOCK
            ))?;
            if let Some(caps) = regex.captures(script) {
                let params = caps[1].trim().to_string();
                let body = caps[2].to_string();
                let source = format!("function {}({}){{{}}}", name, params, body);
                return Ok((source, body));
            }
        }

        Err(ResolveError::FunctionExtraction(format!(
            "could not cut out the body of {}",
            name
        )))
    }

    /// First dotted call in the body whose receiver is not the function's own parameter
    fn locate_helper_object(&self, body: &str, param: &str) -> Result<Option<String>, ResolveError> {
        let helper = helper_call_regex()?
            .captures_iter(body)
            .map(|caps| caps[1].to_string())
            .find(|receiver| receiver != param && !BUILTIN_RECEIVERS.contains(&receiver.as_str()));
        Ok(helper)
    }

    /// Cut out the helper object's literal and emit it as a `var` declaration
    fn extract_helper_source(&self, script: &str, name: &str) -> Result<String, ResolveError> {
        let escaped = regex::escape(name);
        let patterns = [
            format!(r"(?:var|let|const)\s+{}\s*=\s*{}", escaped, BLOCK),
            format!(r"{}{}\s*=\s*{}", BOUNDARY, escaped, BLOCK),
        ];

        for pattern in &patterns {
            let regex = Regex::new(pattern)?;
            if let Some(caps) = regex.captures(script) {
                return Ok(format!("var {}={{{}}};", name, &caps[1]));
            }
        }

        Err(ResolveError::FunctionExtraction(format!(
            "helper object {} definition not found",
            name
        )))
    }
}

impl TransformExtractor for RegexTransformExtractor {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn extract(&self, script: &str) -> Result<DecipherOperations, ResolveError> {
        let (name, param, form) = self.locate_main_function(script)?;
        let (source, body) = self.extract_function_source(script, &name, form)?;

        let mut operations = DecipherOperations {
            main_function_name: name,
            main_function_source: source,
            helper_object_name: None,
            helper_object_source: None,
        };

        match self.locate_helper_object(&body, &param)? {
            Some(helper) => match self.extract_helper_source(script, &helper) {
                Ok(helper_source) => {
                    operations.helper_object_name = Some(helper);
                    operations.helper_object_source = Some(helper_source);
                }
                Err(e) => warn!("Continuing without helper object: {}", e),
            },
            None => debug!("Transform function has no helper object"),
        }

        Ok(operations)
    }
}

/// Engine for one player script version
pub struct SignatureDecipherer {
    state: DecipherState,
    operations: Option<Arc<DecipherOperations>>,
    extractors: Vec<Box<dyn TransformExtractor>>,
    sandbox: Box<dyn ScriptSandbox>,
    /// Sources have been evaluated in the sandbox
    loaded: bool,
    failure: Option<String>,
}

impl SignatureDecipherer {
    /// Create an engine using the regex extractor
    pub fn new(sandbox: Box<dyn ScriptSandbox>) -> Self {
        Self {
            state: DecipherState::Uninitialized,
            operations: None,
            extractors: vec![Box::new(RegexTransformExtractor)],
            sandbox,
            loaded: false,
            failure: None,
        }
    }

    /// Create an engine from operations already extracted for this script version
    pub fn from_operations(operations: Arc<DecipherOperations>, sandbox: Box<dyn ScriptSandbox>) -> Self {
        let mut engine = Self::new(sandbox);
        if operations.is_initialized() {
            engine.operations = Some(operations);
            engine.state = DecipherState::Initialized;
        } else {
            engine.mark_unusable("cached operations are incomplete".to_string());
        }
        engine
    }

    /// Append an extraction strategy tried after the existing ones
    pub fn with_extractor(mut self, extractor: Box<dyn TransformExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn state(&self) -> DecipherState {
        self.state
    }

    /// Extracted operations, once initialized
    pub fn operations(&self) -> Option<Arc<DecipherOperations>> {
        self.operations.clone()
    }

    /// Extract the transform from the player script.
    ///
    /// Calling again after success returns the same operations. After a
    /// failure the engine stays unusable.
    pub fn initialize(&mut self, script: &str) -> Result<Arc<DecipherOperations>, ResolveError> {
        match self.state {
            DecipherState::Initialized => {
                if let Some(ops) = &self.operations {
                    return Ok(Arc::clone(ops));
                }
            }
            DecipherState::Unusable => return Err(self.unusable_error()),
            _ => {}
        }

        if script.trim().is_empty() {
            let err = ResolveError::PatternNotFound("player script is empty".to_string());
            self.mark_unusable(err.to_string());
            return Err(err);
        }
        self.state = DecipherState::ScriptFetched;
        debug!("Extracting transform from {} chars of player script", script.len());

        let mut last_error = None;
        for extractor in &self.extractors {
            match extractor.extract(script) {
                Ok(ops) => {
                    self.state = DecipherState::FunctionExtracted;
                    info!(
                        "Extracted transform {} with {} strategy (helper: {})",
                        ops.main_function_name,
                        extractor.name(),
                        ops.helper_object_name.as_deref().unwrap_or("none")
                    );
                    let ops = Arc::new(ops);
                    self.operations = Some(Arc::clone(&ops));
                    self.state = DecipherState::Initialized;
                    return Ok(ops);
                }
                Err(e) => {
                    debug!("{} strategy failed: {}", extractor.name(), e);
                    last_error = Some(e);
                }
            }
        }

        let err = last_error.unwrap_or_else(|| {
            ResolveError::PatternNotFound("no extraction strategy configured".to_string())
        });
        self.mark_unusable(err.to_string());
        Err(err)
    }

    /// Decipher one scrambled signature
    pub fn decipher(&mut self, encrypted: &str) -> Result<String, ResolveError> {
        if self.state != DecipherState::Initialized {
            return Err(self.unusable_error());
        }
        let ops = match &self.operations {
            Some(ops) => Arc::clone(ops),
            None => return Err(self.unusable_error()),
        };

        if !self.loaded {
            if let Some(helper) = &ops.helper_object_source {
                self.sandbox.load(helper)?;
            }
            self.sandbox.load(&ops.main_function_source)?;
            self.loaded = true;
        }

        self.sandbox.call(&ops.main_function_name, encrypted)
    }

    fn mark_unusable(&mut self, reason: String) {
        warn!("Signature decipherer unusable: {}", reason);
        self.state = DecipherState::Unusable;
        self.operations = None;
        self.failure = Some(reason);
    }

    fn unusable_error(&self) -> ResolveError {
        ResolveError::EngineUnusable(
            self.failure
                .clone()
                .unwrap_or_else(|| format!("decipherer is {}", self.state)),
        )
    }
}

impl SignatureTransform for SignatureDecipherer {
    fn decipher(&mut self, encrypted: &str) -> Result<String, ResolveError> {
        SignatureDecipherer::decipher(self, encrypted)
    }
}
