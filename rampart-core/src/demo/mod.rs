//! In-memory site tree and engine for trying the orchestrator without a
//! network. Used by `rampartctl simulate` and the integration tests.

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use rampart_model::{SiteNode, Target};

use crate::{
    error::{Result, ScanError},
    orchestration::{DispatchOutcome, ScanContext, ScanEngine, WorkUnit},
};

/// Host every generated site links out to. It is never in scope.
pub const EXTERNAL_ROOT: &str = "https://external.demo/";

#[derive(Debug, Clone, Default)]
struct DemoPage {
    in_scope: bool,
    links: Vec<String>,
}

/// A fake site tree: pages keyed by URI, each with outgoing links.
#[derive(Debug, Clone, Default)]
pub struct DemoSite {
    pages: BTreeMap<String, DemoPage>,
}

impl DemoSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// `hosts` sites, each a tree `depth` levels deep with `fanout` children
    /// per page. Every root also links to [`EXTERNAL_ROOT`].
    pub fn generate(hosts: usize, depth: usize, fanout: usize) -> Self {
        let mut site = Self::new();
        site.add_page(EXTERNAL_ROOT, false, Vec::new());
        for host in 0..hosts {
            let root = format!("https://host{host}.demo/");
            site.grow(&root, depth, fanout);
            if let Some(page) = site.pages.get_mut(&root) {
                page.links.push(EXTERNAL_ROOT.to_string());
            }
        }
        site
    }

    fn grow(&mut self, uri: &str, depth: usize, fanout: usize) {
        let links: Vec<String> = if depth == 0 {
            Vec::new()
        } else {
            (0..fanout).map(|i| format!("{uri}p{i}/")).collect()
        };
        self.add_page(uri, true, links.clone());
        for link in links {
            self.grow(&link, depth - 1, fanout);
        }
    }

    pub fn add_page(
        &mut self,
        uri: impl Into<String>,
        in_scope: bool,
        links: Vec<String>,
    ) {
        self.pages.insert(uri.into(), DemoPage { in_scope, links });
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.pages.contains_key(uri)
    }

    pub fn is_in_scope(&self, uri: &str) -> bool {
        self.pages.get(uri).is_some_and(|page| page.in_scope)
    }

    pub fn links(&self, uri: &str) -> &[String] {
        self.pages
            .get(uri)
            .map(|page| page.links.as_slice())
            .unwrap_or_default()
    }

    /// Site tree node for `uri`, as the scope subsystem would hand it out.
    pub fn node(&self, uri: &str) -> Option<SiteNode> {
        self.pages
            .get(uri)
            .map(|page| SiteNode::new(uri, page.in_scope))
    }

    /// Top level pages (`scheme://host/`), in URI order.
    pub fn roots(&self) -> Vec<SiteNode> {
        self.pages
            .iter()
            .filter(|(uri, _)| is_root(uri))
            .map(|(uri, page)| SiteNode::new(uri.as_str(), page.in_scope))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    fn unit(&self, uri: &str) -> WorkUnit {
        WorkUnit::get(uri, self.is_in_scope(uri))
    }
}

fn is_root(uri: &str) -> bool {
    uri.split_once("://")
        .is_some_and(|(_, rest)| rest.find('/') == Some(rest.len() - 1))
}

/// Engine that "requests" pages of a [`DemoSite`].
#[derive(Debug)]
pub struct DemoEngine {
    site: Arc<DemoSite>,
    latency: Option<Duration>,
    dispatched: AtomicU64,
}

impl DemoEngine {
    pub fn new(site: Arc<DemoSite>) -> Self {
        Self {
            site,
            latency: None,
            dispatched: AtomicU64::new(0),
        }
    }

    /// Delay every request by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = (!latency.is_zero()).then_some(latency);
        self
    }

    pub fn site(&self) -> &DemoSite {
        &self.site
    }

    /// Requests completed so far, across all scans.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ScanEngine for DemoEngine {
    async fn plan(
        &self,
        target: &Target,
        _ctx: &ScanContext,
    ) -> Result<Vec<WorkUnit>> {
        match target.start() {
            Some(node) if self.site.contains(&node.path) => {
                Ok(vec![self.site.unit(&node.path)])
            }
            Some(node) => Err(ScanError::Engine(anyhow::anyhow!(
                "no such page in demo site: {}",
                node.path
            ))),
            None => Ok(self
                .site
                .roots()
                .iter()
                .map(|root| self.site.unit(&root.path))
                .collect()),
        }
    }

    async fn dispatch(
        &self,
        unit: &WorkUnit,
        ctx: &ScanContext,
    ) -> Result<DispatchOutcome> {
        if let Some(latency) = self.latency {
            tokio::select! {
                _ = ctx.cancellation().cancelled() => {
                    return Err(ScanError::Cancelled(unit.uri.clone()));
                }
                _ = tokio::time::sleep(latency) => {}
            }
        }
        self.dispatched.fetch_add(1, Ordering::Relaxed);

        if !self.site.contains(&unit.uri) {
            return Ok(DispatchOutcome {
                discovered: Vec::new(),
                flags: "404".to_string(),
            });
        }
        Ok(DispatchOutcome {
            discovered: self
                .site
                .links(&unit.uri)
                .iter()
                .map(|link| self.site.unit(link))
                .collect(),
            flags: String::new(),
        })
    }
}
