//! A named command and its ordered syntax rules.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use textline_core::Response;

use crate::context::Context;
use crate::error::RegistryError;
use crate::rule::{match_rule, parse_rule, Args, Token};

/// Future returned by a handler invocation.
pub type HandlerFuture = BoxFuture<'static, anyhow::Result<Response>>;

/// A boxed handler function.
///
/// Handlers receive the invocation context and the positional captures
/// of the rule that matched. A `Err` return is a handler fault and is
/// normalized into an error [`Response`] at the dispatch boundary; a
/// deliberate domain failure should be an `Ok` error response instead.
pub type Handler = Arc<dyn Fn(Context, Args) -> HandlerFuture + Send + Sync>;

pub(crate) struct SyntaxRule {
    pub(crate) source: String,
    pub(crate) tokens: Vec<Token>,
    pub(crate) doc: String,
    pub(crate) handler: Handler,
}

/// A named command exposing one or more textual syntaxes.
///
/// Rules are tried in registration order and the first match wins, so
/// registration order encodes priority: a literal rule that overlaps a
/// parameter rule must be registered before it to take precedence.
///
/// Every spec answers `<name> help` with a reflective listing of its
/// rules; registering the literal rule text `"help"` therefore fails.
///
/// A spec is bound to a registry by moving it into
/// [`CommandRegistry::register`](crate::CommandRegistry::register),
/// which makes double-binding impossible by construction.
pub struct CommandSpec {
    name: String,
    doc: String,
    rules: Vec<SyntaxRule>,
    utils: Option<Arc<dyn Any + Send + Sync>>,
}

impl CommandSpec {
    /// Create a spec. The name must be non-empty; it doubles as the
    /// namespace for the command's persistent and session state.
    pub fn new(name: impl Into<String>, doc: impl Into<String>) -> Result<Self, RegistryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        Ok(Self {
            name,
            doc: doc.into(),
            rules: Vec::new(),
            utils: None,
        })
    }

    /// Append a syntax rule. Order of calls is match priority.
    pub fn rule<F, Fut>(
        mut self,
        source: impl Into<String>,
        doc: impl Into<String>,
        handler: F,
    ) -> Result<Self, RegistryError>
    where
        F: Fn(Context, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        let source = source.into();
        if source == "help" {
            return Err(RegistryError::ReservedHelp);
        }
        let tokens = parse_rule(&source)?;
        self.rules.push(SyntaxRule {
            source,
            tokens,
            doc: doc.into(),
            handler: Arc::new(move |ctx, args| Box::pin(handler(ctx, args))),
        });
        Ok(self)
    }

    /// Attach a utils object other commands can fetch through
    /// [`CommandRegistry::utils`](crate::CommandRegistry::utils).
    ///
    /// Utils helpers must not touch the store or a context directly;
    /// they operate over a context supplied by their caller.
    pub fn with_utils(mut self, utils: impl Any + Send + Sync) -> Self {
        self.utils = Some(Arc::new(utils));
        self
    }

    /// The command's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The command's one-line documentation.
    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub(crate) fn utils_any(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.utils.clone()
    }

    /// Match `args` against the rules in registration order and invoke
    /// the first winner's handler with its captures.
    ///
    /// `<name> help` is answered reflectively before any rule is tried.
    /// No match produces an error response that embeds the
    /// parameter-only rendering of every registered rule.
    pub async fn run(&self, ctx: Context, args: Vec<String>) -> anyhow::Result<Response> {
        if args.len() == 1 && args[0] == "help" {
            return Ok(self.render_help(false));
        }

        for rule in &self.rules {
            if let Some(captures) = match_rule(&rule.tokens, &args) {
                return (rule.handler)(ctx, captures).await;
            }
        }

        Ok(Response::error(format!(
            "Invalid arguments. Try one of the following instead:\n{}",
            self.render_help(true).message
        )))
    }

    /// Render the rule listing. With `params_only` the name/doc header
    /// is omitted, which is the form embedded in no-match errors.
    pub fn render_help(&self, params_only: bool) -> Response {
        let mut out = String::new();
        if !params_only {
            out.push_str(&format!("{}: {}\n", self.name, self.doc));
            out.push_str("Possible variations:\n");
        }
        for rule in &self.rules {
            let spacer = if rule.source.is_empty() { "" } else { " " };
            out.push_str(&format!(
                "    {}{}{}: {}\n",
                self.name, spacer, rule.source, rule.doc
            ));
        }
        Response::ok(out.trim_end().to_string())
    }
}
