//! Result assembler: the request pipeline from raw query to host items

use crate::cache::{CacheStore, FOLDER_LIST_KEY};
use crate::config::Config;
use crate::error::SmartFoldersError;
use crate::folder::{contents_cache_key, file_base_name, SmartFolder};
use crate::fuzzy;
use crate::gateway::IndexGateway;
use crate::navigator;
use crate::refresh::{RefreshExecutor, RefreshTask, Refresher, ThreadExecutor};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Uniform type identifier the host uses for smart folder row icons.
pub const SMART_FOLDER_UTI: &str = "com.apple.finder.smart-folder";

/// Icon reference handed to the host renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "path", rename_all = "lowercase")]
pub enum Icon {
    /// Icon looked up by uniform type identifier.
    Filetype(String),
    /// Icon of the file at a path.
    Fileicon(String),
}

/// One entry of the ordered result sequence produced for the host.
#[derive(Debug, Clone, Serialize)]
pub struct ResultItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub title: String,
    pub subtitle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg: Option<String>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autocomplete: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
}

impl ResultItem {
    /// A smart folder row. Not directly actionable (most file actions don't
    /// work on saved searches), so it autocompletes into the folder instead.
    pub fn folder(folder: &SmartFolder, delimiter: char) -> Self {
        Self {
            uid: Some(folder.path.clone()),
            title: folder.name.clone(),
            subtitle: folder.path.clone(),
            arg: Some(folder.path.clone()),
            valid: false,
            autocomplete: Some(format!("{} {} ", folder.name, delimiter)),
            icon: Some(Icon::Filetype(SMART_FOLDER_UTI.to_string())),
        }
    }

    /// A file row inside a folder, actionable by the host.
    pub fn file(path: &str) -> Self {
        Self {
            uid: Some(path.to_string()),
            title: file_base_name(path).to_string(),
            subtitle: path.to_string(),
            arg: Some(path.to_string()),
            valid: true,
            autocomplete: None,
            icon: Some(Icon::Fileicon(path.to_string())),
        }
    }

    /// An informational row: scanning placeholder, empty-folder notice, or
    /// the unknown-folder error entry. Never actionable.
    pub fn notice(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            uid: None,
            title: title.into(),
            subtitle: subtitle.into(),
            arg: None,
            valid: false,
            autocomplete: None,
            icon: None,
        }
    }
}

/// What one pipeline invocation produced for the host.
#[derive(Debug)]
pub enum Outcome {
    /// Ranked, capped result entries, plus an optional "re-invoke me
    /// shortly" delay when a background refresh is in flight.
    Results {
        items: Vec<ResultItem>,
        rerun_after: Option<Duration>,
    },
    /// The query backed out of a folder; the host should reopen with a bare
    /// trigger, i.e. the top-level folder list with an empty query.
    Reset,
}

/// Drives one synchronous invocation: parse, resolve, cached read,
/// maybe-kick-refresh, filter, emit. Never blocks on gateway I/O.
pub struct Assembler {
    config: Config,
    cache: Arc<CacheStore>,
    refresher: Refresher,
}

impl Assembler {
    /// Assembler refreshing on in-process threads. Suits long-lived hosts
    /// and tests; one-shot hosts use [`Assembler::with_executor`].
    pub fn new(config: Config, cache: Arc<CacheStore>, gateway: Arc<dyn IndexGateway>) -> Self {
        let executor = Arc::new(ThreadExecutor::new(Arc::clone(&cache), gateway));
        Self::with_executor(config, cache, executor)
    }

    /// Assembler submitting refreshes to `executor`. A one-shot host passes
    /// an executor that detaches a worker process, so refreshes survive the
    /// invocation that kicked them.
    pub fn with_executor(
        config: Config,
        cache: Arc<CacheStore>,
        executor: Arc<dyn RefreshExecutor>,
    ) -> Self {
        let refresher = Refresher::new(Arc::clone(&cache), executor);
        Self {
            config,
            cache,
            refresher,
        }
    }

    /// Run the whole pipeline for one raw query.
    pub fn run(&self, raw_query: &str) -> crate::Result<Outcome> {
        let nav = navigator::parse(raw_query, self.config.delimiter());
        tracing::debug!(?nav, "parsed query");

        if nav.backed_up {
            return Ok(Outcome::Reset);
        }

        let folders = match self.cached_folder_list()? {
            Some(folders) => folders,
            None => return Ok(self.scanning_outcome("Scanning smart folders...")),
        };

        match nav.folder_selector {
            Some(ref selector) if !selector.is_empty() => {
                let Some(folder) = resolve_folder(&folders, selector) else {
                    return Err(SmartFoldersError::UnknownFolder {
                        selector: selector.clone(),
                    });
                };
                self.inside_folder(folder, &nav.residual_query)
            }
            // A delimiter with nothing before it names no folder; the
            // residual filters the folder list, never auto-enters one.
            Some(_) => self.list_folders(&folders, &nav.residual_query),
            None => self.flat_query(&folders, &nav.residual_query),
        }
    }

    /// Search one folder directly, bypassing query navigation. Backs the
    /// host's explicit folder flag.
    pub fn browse_folder(&self, selector: &str, query: &str) -> crate::Result<Outcome> {
        let folders = match self.cached_folder_list()? {
            Some(folders) => folders,
            None => return Ok(self.scanning_outcome("Scanning smart folders...")),
        };
        let Some(folder) = resolve_folder(&folders, selector) else {
            return Err(SmartFoldersError::UnknownFolder {
                selector: selector.to_string(),
            });
        };
        self.inside_folder(folder, query.trim())
    }

    /// Flat-query mode: no delimiter present. Auto-entry heuristic first
    /// (folder name must be a case-insensitive prefix of the query, first
    /// satisfying folder in sorted order wins), else filter the folder list
    /// by the whole query.
    fn flat_query(&self, folders: &[SmartFolder], query: &str) -> crate::Result<Outcome> {
        if !query.is_empty() {
            for folder in folders {
                // An exact name match enters with an empty residual query.
                if let Some(rest) = strip_prefix_ignore_case(query, &folder.name) {
                    return self.inside_folder(folder, rest.trim());
                }
            }
        }
        self.list_folders(folders, query)
    }

    fn list_folders(&self, folders: &[SmartFolder], query: &str) -> crate::Result<Outcome> {
        let matched = fuzzy::filter_by(
            query,
            folders.to_vec(),
            |f| f.name.as_str(),
            self.config.results.folder_min_score,
        );
        let items: Vec<ResultItem> = matched
            .iter()
            .take(self.config.results.max_results)
            .map(|f| ResultItem::folder(f, self.config.delimiter()))
            .collect();
        Ok(Outcome::Results {
            items,
            rerun_after: self.rerun_signal(&[FOLDER_LIST_KEY]),
        })
    }

    fn inside_folder(&self, folder: &SmartFolder, residual: &str) -> crate::Result<Outcome> {
        let key = contents_cache_key(&folder.path);
        if !self.cache.is_fresh(&key, self.config.contents_ttl())? {
            self.refresher.run_in_background(RefreshTask::FolderContents {
                folder_path: folder.path.clone(),
            });
        }

        let Some(contents) = self.cache.get_json::<Vec<String>>(&key)? else {
            return Ok(self.scanning_outcome(&format!("Scanning '{}'...", folder.name)));
        };

        let matched = fuzzy::filter_by(
            residual,
            contents,
            |path| file_base_name(path),
            self.config.results.file_min_score,
        );
        let items: Vec<ResultItem> = matched
            .iter()
            .take(self.config.results.max_results)
            .map(|path| ResultItem::file(path))
            .collect();

        let items = if items.is_empty() {
            // Distinguish "folder has nothing yet" from "nothing matched".
            let notice = if residual.is_empty() {
                ResultItem::notice(
                    format!("'{}' is empty", folder.name),
                    "This smart folder currently resolves to no files",
                )
            } else {
                ResultItem::notice(
                    format!("No matches in '{}'", folder.name),
                    format!("No file names match '{}'", residual),
                )
            };
            vec![notice]
        } else {
            items
        };

        Ok(Outcome::Results {
            items,
            rerun_after: self.rerun_signal(&[FOLDER_LIST_KEY, &key]),
        })
    }

    /// Nothing cached yet for the target key: a refresh was just kicked (or
    /// is already running), so show a placeholder and ask to be re-invoked.
    fn scanning_outcome(&self, title: &str) -> Outcome {
        Outcome::Results {
            items: vec![ResultItem::notice(title, "Results will appear in a moment")],
            rerun_after: Some(self.config.rerun_delay()),
        }
    }

    /// Re-poll signal: set whenever a refresh for a key this invocation read
    /// is still in flight.
    fn rerun_signal(&self, keys: &[&str]) -> Option<Duration> {
        keys.iter()
            .any(|key| self.refresher.is_running(key))
            .then(|| self.config.rerun_delay())
    }

    /// Cached folder list, kicking a background rescan when stale or absent.
    fn cached_folder_list(&self) -> crate::Result<Option<Vec<SmartFolder>>> {
        if !self
            .cache
            .is_fresh(FOLDER_LIST_KEY, self.config.folder_list_ttl())?
        {
            self.refresher.run_in_background(RefreshTask::FolderList);
        }
        self.cache.get_json(FOLDER_LIST_KEY)
    }
}

/// First entry whose path equals the selector, else first whose name equals
/// it case-insensitively. Sorted order resolves name collisions.
fn resolve_folder<'a>(folders: &'a [SmartFolder], selector: &str) -> Option<&'a SmartFolder> {
    folders
        .iter()
        .find(|f| f.path == selector)
        .or_else(|| folders.iter().find(|f| eq_ignore_case(&f.name, selector)))
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Case-insensitive `strip_prefix`, returning the untouched remainder of
/// `query` when `name` is a prefix of it.
fn strip_prefix_ignore_case<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    let mut query_chars = query.char_indices();
    let mut name_chars = name.chars();
    loop {
        let Some(n) = name_chars.next() else {
            return match query_chars.next() {
                Some((idx, _)) => Some(&query[idx..]),
                None => Some(""),
            };
        };
        let (_, q) = query_chars.next()?;
        if !q.to_lowercase().eq(n.to_lowercase()) {
            return None;
        }
    }
}
