// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Location dispatcher - runs handlers whose route matches a path
//!
//! Routes are plain text with `:name` placeholders, each capturing a run
//! of word characters and dots. A route matches anywhere in the path.
//! The special route `*` always runs, before the others.
//!
//! ```ignore
//! let routes = LocationDispatcher::new()
//!     .route("*", |_, _| println!("every page"))?
//!     .route("article/:id", |_, params| println!("article {}", params["id"]))?;
//! clay.bake(&routes, "/blog/article/42");
//! ```

use crate::error::Result;
use crate::runtime::Clay;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::trace;

/// Parameters captured from a path
pub type RouteParams = HashMap<String, String>;

/// Handler run for a matching route
pub type RouteHandler = Box<dyn Fn(&Clay, &RouteParams) + Send + Sync>;

/// Route that matches every path
pub const ALWAYS: &str = "*";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([A-Za-z_.+\-]+)").expect("placeholder pattern is valid"));

struct Route {
    pattern: String,
    matcher: Regex,
    params: Vec<String>,
    handler: RouteHandler,
}

/// Ordered set of routes
#[derive(Default)]
pub struct LocationDispatcher {
    always: Option<RouteHandler>,
    routes: Vec<Route>,
}

impl LocationDispatcher {
    /// Create a dispatcher with no routes
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route; `*` replaces the always-run handler
    pub fn route<F>(mut self, pattern: &str, handler: F) -> Result<Self>
    where
        F: Fn(&Clay, &RouteParams) + Send + Sync + 'static,
    {
        if pattern == ALWAYS {
            self.always = Some(Box::new(handler));
            return Ok(self);
        }

        let (matcher, params) = compile(pattern)?;
        self.routes.push(Route {
            pattern: pattern.to_string(),
            matcher,
            params,
            handler: Box::new(handler),
        });
        Ok(self)
    }

    /// Number of routes, not counting `*`
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Check if there are no routes, not counting `*`
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Run every handler matching `path`; returns how many ran
    pub fn dispatch(&self, clay: &Clay, path: &str) -> usize {
        let mut ran = 0;
        if let Some(always) = &self.always {
            always(clay, &RouteParams::new());
            ran += 1;
        }

        for route in &self.routes {
            let Some(captures) = route.matcher.captures(path) else {
                continue;
            };
            let params: RouteParams = route
                .params
                .iter()
                .zip(captures.iter().skip(1))
                .filter_map(|(name, value)| value.map(|v| (name.clone(), v.as_str().to_string())))
                .collect();
            trace!(route = %route.pattern, path, "route matched");
            (route.handler)(clay, &params);
            ran += 1;
        }
        ran
    }
}

/// Turn a route into a regex plus the placeholder names, in order
fn compile(pattern: &str) -> Result<(Regex, Vec<String>)> {
    let mut source = String::new();
    let mut params = Vec::new();
    let mut last = 0;

    for captures in PLACEHOLDER.captures_iter(pattern) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        source.push_str(&regex::escape(&pattern[last..whole.start()]));
        source.push_str(r"([\w.]+)");
        params.push(name.as_str().to_string());
        last = whole.end();
    }
    source.push_str(&regex::escape(&pattern[last..]));

    Ok((Regex::new(&source)?, params))
}

impl Clay {
    /// Dispatch `path` through `routes` without waiting for the ready gate
    pub fn bake(&self, routes: &LocationDispatcher, path: &str) -> usize {
        routes.dispatch(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_compile_escapes_literals() {
        let (matcher, params) = compile("docs/:page.html").unwrap();
        assert_eq!(params, vec!["page.html"]);
        assert!(matcher.is_match("/docs/intro"));

        let (matcher, params) = compile("a+b/:id/c").unwrap();
        assert_eq!(params, vec!["id"]);
        assert!(matcher.is_match("/a+b/7/c"));
        assert!(!matcher.is_match("/aab/7/c"));
    }

    #[test]
    fn test_dispatch_runs_always_then_matches() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());

        let routes = LocationDispatcher::new()
            .route("foo/:name", move |_, params| {
                l1.lock().push(format!("foo:{}", params["name"]))
            })
            .unwrap()
            .route(ALWAYS, move |_, params| {
                assert!(params.is_empty());
                l2.lock().push("always".to_string())
            })
            .unwrap()
            .route("hige/moja", move |_, _| l3.lock().push("hige".to_string()))
            .unwrap();
        assert_eq!(routes.len(), 2);

        let clay = Clay::builder().build();
        assert_eq!(clay.bake(&routes, "/app/foo/some.page"), 2);
        assert_eq!(*log.lock(), vec!["always", "foo:some.page"]);
    }

    #[test]
    fn test_multiple_placeholders() {
        let seen = Arc::new(Mutex::new(RouteParams::new()));
        let s = seen.clone();
        let routes = LocationDispatcher::new()
            .route("users/:user/posts/:post", move |_, params| {
                *s.lock() = params.clone();
            })
            .unwrap();

        let clay = Clay::builder().build();
        assert_eq!(clay.bake(&routes, "/users/ayumu/posts/12"), 1);
        let seen = seen.lock();
        assert_eq!(seen["user"], "ayumu");
        assert_eq!(seen["post"], "12");
        assert_eq!(clay.bake(&routes, "/users"), 0);
    }
}
