//! Unit of work variants and the diagnostic correlation context.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Which flavour of unit of work to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOfWorkVariant {
    /// Plain bookkeeping.
    #[default]
    Baseline,
    /// Also carries a correlation context into every callback's log scope.
    Diagnostic,
}

impl UnitOfWorkVariant {
    /// Selects the variant from the diagnostics flag. `None` means baseline.
    #[must_use]
    pub fn select(diagnostics: Option<bool>) -> Self {
        if diagnostics.unwrap_or(false) {
            Self::Diagnostic
        } else {
            Self::Baseline
        }
    }

    /// Returns true for the diagnostic variant.
    #[must_use]
    pub fn is_diagnostic(self) -> bool {
        matches!(self, Self::Diagnostic)
    }
}

impl fmt::Display for UnitOfWorkVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Baseline => write!(f, "baseline"),
            Self::Diagnostic => write!(f, "diagnostic"),
        }
    }
}

/// Correlation identifiers attached to log output of a diagnostic unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationContext {
    /// The exchange being processed.
    pub exchange_id: Uuid,
    /// The unit of work tracking it.
    pub uow_id: Uuid,
    /// Breadcrumb shared by related exchanges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breadcrumb_id: Option<String>,
    /// Route the exchange entered through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_id: Option<String>,
}

impl CorrelationContext {
    /// Creates a context for an exchange and its unit of work.
    #[must_use]
    pub fn new(exchange_id: Uuid, uow_id: Uuid) -> Self {
        Self {
            exchange_id,
            uow_id,
            breadcrumb_id: None,
            route_id: None,
        }
    }

    /// Sets the breadcrumb ID.
    #[must_use]
    pub fn with_breadcrumb_id(mut self, breadcrumb_id: Option<String>) -> Self {
        self.breadcrumb_id = breadcrumb_id;
        self
    }

    /// Sets the route ID.
    #[must_use]
    pub fn with_route_id(mut self, route_id: Option<String>) -> Self {
        self.route_id = route_id;
        self
    }

    /// Converts to a dictionary with string values (or null).
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert(
            "exchange_id".to_string(),
            serde_json::json!(self.exchange_id.to_string()),
        );
        map.insert("uow_id".to_string(), serde_json::json!(self.uow_id.to_string()));
        map.insert(
            "breadcrumb_id".to_string(),
            self.breadcrumb_id
                .as_ref()
                .map_or(serde_json::Value::Null, |id| serde_json::json!(id)),
        );
        map.insert(
            "route_id".to_string(),
            self.route_id
                .as_ref()
                .map_or(serde_json::Value::Null, |id| serde_json::json!(id)),
        );
        map
    }

    /// Builds the tracing span that carries these fields.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "unit_of_work",
            exchange_id = %self.exchange_id,
            uow_id = %self.uow_id,
            breadcrumb_id = self.breadcrumb_id.as_deref(),
            route_id = self.route_id.as_deref()
        )
    }
}

/// Live diagnostic state of a unit of work: the context and its span.
#[derive(Debug, Clone)]
pub(crate) struct DiagnosticScope {
    pub(crate) context: CorrelationContext,
    pub(crate) span: tracing::Span,
}

impl DiagnosticScope {
    pub(crate) fn new(context: CorrelationContext) -> Self {
        let span = context.span();
        Self { context, span }
    }
}
