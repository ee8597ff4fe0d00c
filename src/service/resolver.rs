//! GraphQL operation resolution at the subscribe boundary.
//!
//! The protocol server does not execute GraphQL. When a `subscribe` message
//! arrives it hands the raw query text to an [`OperationResolver`], which
//! either identifies the operation to run or reports query-level errors.
//! Those errors are recoverable: they become an `error` message scoped to
//! the subscription id and never terminate the connection.
//!
//! [`DocumentResolver`] is the bundled implementation. It performs a
//! lightweight top-level scan of the document — enough to locate operation
//! definitions, select one by name, and enforce that only `subscription`
//! operations are served — without pulling in a full GraphQL engine.

use serde_json::Value;

use crate::error::QueryError;

/// The kind of a GraphQL operation definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// A read-only query operation.
    Query,
    /// A mutation operation.
    Mutation,
    /// A subscription operation.
    Subscription,
}

impl OperationKind {
    /// Returns the GraphQL keyword for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

/// An operation identified within a client-supplied query document.
///
/// Passed to [`Subscriber`](super::Subscriber) handlers, which decide how to
/// serve the subscription from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOperation {
    /// The operation kind. Always [`OperationKind::Subscription`] for
    /// operations resolved through the bundled [`DocumentResolver`].
    pub kind: OperationKind,
    /// The operation name, when the definition carries one.
    pub name: Option<String>,
    /// The full query document text the operation was found in.
    pub document: String,
}

/// Resolves raw query text into an executable operation.
///
/// Implementations must be non-blocking: resolution runs on the connection's
/// message path. Failures are query-level by contract — a resolver never
/// produces a connection-fatal error.
pub trait OperationResolver: Send + Sync {
    /// Identifies the operation to run for a `subscribe` request.
    ///
    /// # Errors
    ///
    /// Returns a non-empty list of [`QueryError`]s when the document cannot
    /// be parsed, no usable operation could be identified, or the operation
    /// is of a kind this server does not serve.
    fn resolve(
        &self,
        query: &str,
        operation_name: Option<&str>,
        variables: Option<&Value>,
    ) -> Result<ResolvedOperation, Vec<QueryError>>;
}

/// One operation definition found by the document scan.
#[derive(Debug)]
struct OperationDef {
    kind: OperationKind,
    name: Option<String>,
}

/// Lightweight subscription-only resolver.
///
/// Scans the document at brace depth zero for operation definitions. This is
/// deliberately not a full GraphQL parser: selection sets are opaque to it,
/// and validation against a schema is left to the
/// [`Subscriber`](super::Subscriber) handlers that execute the operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentResolver;

impl DocumentResolver {
    /// Creates a new `DocumentResolver`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl OperationResolver for DocumentResolver {
    fn resolve(
        &self,
        query: &str,
        operation_name: Option<&str>,
        _variables: Option<&Value>,
    ) -> Result<ResolvedOperation, Vec<QueryError>> {
        let mut operations = scan_operations(query).map_err(|e| vec![e])?;

        let operation = match operation_name {
            Some(name) => operations
                .into_iter()
                .find(|op| op.name.as_deref() == Some(name)),
            None if operations.len() == 1 => Some(operations.remove(0)),
            None => None,
        }
        .ok_or_else(|| vec![QueryError::new("Could not identify operation.")])?;

        if operation.kind != OperationKind::Subscription {
            return Err(vec![QueryError::new(
                "This server only supports 'subscription' operations.",
            )]);
        }

        Ok(ResolvedOperation {
            kind: operation.kind,
            name: operation.name,
            document: query.to_string(),
        })
    }
}

/// Collects the operation definitions declared at the top level of a
/// document. Fragment definitions are recognized and skipped.
fn scan_operations(document: &str) -> Result<Vec<OperationDef>, QueryError> {
    let mut operations = Vec::new();
    let mut header = String::new();
    let mut pending: Option<Option<OperationDef>> = None;
    let mut depth: u32 = 0;

    for line in document.lines() {
        // GraphQL comments run from '#' to end of line.
        let line = line.split('#').next().unwrap_or_default();
        for c in line.chars() {
            match c {
                '{' => {
                    if depth == 0 {
                        pending = Some(parse_definition_header(&header)?);
                        header.clear();
                    }
                    depth += 1;
                }
                '}' => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        QueryError::new("Syntax error: unbalanced braces in document.")
                    })?;
                    if depth == 0
                        && let Some(Some(op)) = pending.take()
                    {
                        operations.push(op);
                    }
                }
                _ => {
                    if depth == 0 {
                        header.push(c);
                    }
                }
            }
        }
        if depth == 0 {
            header.push(' ');
        }
    }

    if depth != 0 {
        return Err(QueryError::new(
            "Syntax error: unbalanced braces in document.",
        ));
    }
    if !header.trim().is_empty() {
        return Err(QueryError::new(
            "Syntax error: definition without a selection set.",
        ));
    }
    Ok(operations)
}

/// Parses the text preceding a top-level `{` into an operation definition.
///
/// Returns `Ok(None)` for fragment definitions. An empty header is the
/// query-shorthand form.
fn parse_definition_header(header: &str) -> Result<Option<OperationDef>, QueryError> {
    // Variable definitions and directives follow the name; everything up to
    // the first '(' or '@' is keyword + name.
    let head = header
        .split(['(', '@'])
        .next()
        .unwrap_or_default()
        .trim();

    if head.is_empty() {
        return Ok(Some(OperationDef {
            kind: OperationKind::Query,
            name: None,
        }));
    }

    let mut words = head.split_whitespace();
    let kind = match words.next() {
        Some("query") => OperationKind::Query,
        Some("mutation") => OperationKind::Mutation,
        Some("subscription") => OperationKind::Subscription,
        Some("fragment") => return Ok(None),
        Some(other) => {
            return Err(QueryError::new(format!("Syntax error: unexpected '{other}'.")));
        }
        None => {
            return Ok(Some(OperationDef {
                kind: OperationKind::Query,
                name: None,
            }));
        }
    };
    let name = words.next().map(str::to_string);

    Ok(Some(OperationDef { kind, name }))
}
