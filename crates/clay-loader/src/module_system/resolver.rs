// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module identifier to script URL resolution

use crate::config::LoaderConfig;
use crate::error::Result;
use regex::Regex;

/// Maps a module identifier to the URL its script is loaded from
pub trait ScriptResolver: Send + Sync {
    /// Resolve a module identifier
    fn resolve(&self, id: &str) -> String;
}

impl<F> ScriptResolver for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn resolve(&self, id: &str) -> String {
        self(id)
    }
}

/// Resolver deriving URLs from a base root: `base + a/b/c + .ext`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRoot {
    /// Prefix for every URL
    base: String,
    /// Extension without the leading dot
    extension: String,
}

impl ScriptRoot {
    /// Create a resolver with the default `js` extension
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            extension: "js".to_string(),
        }
    }

    /// Use a different extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Build a resolver from configuration.
    ///
    /// A configured `script_root` wins; otherwise the root is empty and
    /// URLs are relative.
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self::new(config.script_root.clone().unwrap_or_default()).with_extension(&config.extension)
    }

    /// Discover the root from the sources of the scripts already present.
    ///
    /// The first source whose tail matches `pattern` (the loader's own
    /// filename) yields everything before the match.
    pub fn discover<'a, I>(sources: I, pattern: &str) -> Result<Option<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let pattern = Regex::new(pattern)?;
        Ok(sources.into_iter().find_map(|src| {
            pattern
                .find(src)
                .map(|found| src[..found.start()].to_string())
        }))
    }

    /// The URL prefix
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The extension
    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl ScriptResolver for ScriptRoot {
    fn resolve(&self, id: &str) -> String {
        format!("{}{}.{}", self.base, id.replace('.', "/"), self.extension)
    }
}
