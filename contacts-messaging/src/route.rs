//! Positional parsing of envelope routes.
//!
//! Routes look like `contacts`, `contacts/42` or `contacts/region/011`.

use std::fmt;

use crate::error::{MessagingError, MessagingResult};

/// Path segment that introduces a region filter.
const REGION_SEGMENT: &str = "region";

/// What a route points at within its resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// The whole collection
    Collection,
    /// A single record
    Id(i32),
    /// The records of one region
    Region(String),
}

/// A parsed route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRoute {
    /// Resource kind, the first segment
    pub resource: String,
    /// Target within the resource
    pub target: RouteTarget,
}

impl ResourceRoute {
    /// The record id, if the route names one
    pub fn id(&self) -> Option<i32> {
        match self.target {
            RouteTarget::Id(id) => Some(id),
            _ => None,
        }
    }

    /// The region filter, if the route names one
    pub fn region(&self) -> Option<&str> {
        match &self.target {
            RouteTarget::Region(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            RouteTarget::Collection => write!(f, "{}", self.resource),
            RouteTarget::Id(id) => write!(f, "{}/{}", self.resource, id),
            RouteTarget::Region(code) => {
                write!(f, "{}/{}/{}", self.resource, REGION_SEGMENT, code)
            }
        }
    }
}

/// Parse a route into its resource and target.
pub fn parse_route(route: &str) -> MessagingResult<ResourceRoute> {
    let mut segments = route.split('/');

    let resource = segments.next().unwrap_or_default();
    if resource.is_empty() {
        return Err(routing_error(route, "missing resource"));
    }

    let target = match segments.next() {
        None | Some("") => RouteTarget::Collection,
        Some(REGION_SEGMENT) => match segments.next() {
            Some(code) if !code.is_empty() => RouteTarget::Region(code.to_string()),
            _ => return Err(routing_error(route, "missing region code")),
        },
        Some(segment) => RouteTarget::Id(
            parse_id(segment).ok_or_else(|| routing_error(route, "identifier is not an integer"))?,
        ),
    };

    if segments.any(|s| !s.is_empty()) {
        return Err(routing_error(route, "unexpected trailing segments"));
    }

    Ok(ResourceRoute {
        resource: resource.to_string(),
        target,
    })
}

/// Digits only: no sign, no whitespace, must fit in `i32`.
fn parse_id(segment: &str) -> Option<i32> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

fn routing_error(route: &str, reason: &str) -> MessagingError {
    MessagingError::Routing(format!("invalid route '{}': {}", route, reason))
}
