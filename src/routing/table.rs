//! The live route table.
//!
//! [`AppRoutes`] holds one [`AppRoute`] per route directory, always sorted by
//! descending score (ties broken by route id). That order is the match
//! priority: the first matching route wins.
//!
//! Routes are stored as `Arc<AppRoute>` and mutated copy-on-write, so any
//! snapshot handed out (to a manifest, a build, a request) never changes
//! underneath its holder.

use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

use super::{RouteError, RouteFile, RouteKind, RouteMatchers, RouteParams, RoutePattern, compile};
use crate::module::{LazyModule, ModuleLoader};

// ============================================================================
// AppRoute
// ============================================================================

/// A populated role slot: the file and its lazily loaded module.
#[derive(Debug, Clone)]
pub struct RouteSlot {
    pub file: RouteFile,
    pub module: LazyModule,
}

/// Everything routed from one directory.
#[derive(Debug, Clone)]
pub struct AppRoute {
    /// Route string of the directory (`/blog/[slug]`).
    pub id: String,
    pub pattern: RoutePattern,
    pub layout: Option<RouteSlot>,
    pub page: Option<RouteSlot>,
    pub error: Option<RouteSlot>,
    pub http: Option<RouteSlot>,
    /// `true` unless the route only has an http slot.
    pub client: bool,
}

impl AppRoute {
    fn new(id: String, pattern: RoutePattern) -> Self {
        Self {
            id,
            pattern,
            layout: None,
            page: None,
            error: None,
            http: None,
            client: false,
        }
    }

    #[inline]
    pub fn score(&self) -> i64 {
        self.pattern.score()
    }

    #[inline]
    pub fn pathname(&self) -> &str {
        self.pattern.pathname()
    }

    #[inline]
    pub fn dynamic(&self) -> bool {
        self.pattern.dynamic()
    }

    /// Whether the last segment of the route is a literal file name such as
    /// `feed.xml`, rather than a page name or a parameter.
    pub fn names_file(&self) -> bool {
        self.id
            .rsplit('/')
            .next()
            .is_some_and(|last| last.contains('.') && !last.contains('[') && !last.starts_with('('))
    }

    pub fn slot(&self, kind: RouteKind) -> Option<&RouteSlot> {
        match kind {
            RouteKind::Layout => self.layout.as_ref(),
            RouteKind::Page => self.page.as_ref(),
            RouteKind::Error => self.error.as_ref(),
            RouteKind::Http => self.http.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: RouteKind) -> &mut Option<RouteSlot> {
        match kind {
            RouteKind::Layout => &mut self.layout,
            RouteKind::Page => &mut self.page,
            RouteKind::Error => &mut self.error,
            RouteKind::Http => &mut self.http,
        }
    }

    #[inline]
    pub fn has(&self, kind: RouteKind) -> bool {
        self.slot(kind).is_some()
    }

    /// Populated kinds, in slot order.
    pub fn kinds(&self) -> impl Iterator<Item = RouteKind> + '_ {
        RouteKind::ALL.into_iter().filter(|&kind| self.has(kind))
    }

    /// Populated client kinds (layout, error, page), in manifest order.
    pub fn client_kinds(&self) -> impl Iterator<Item = RouteKind> + '_ {
        RouteKind::CLIENT.into_iter().filter(|&kind| self.has(kind))
    }

    pub fn is_empty(&self) -> bool {
        self.kinds().next().is_none()
    }

    /// Number of directory segments below the app root.
    pub fn depth(&self) -> usize {
        self.id.split('/').filter(|s| !s.is_empty()).count()
    }

    /// Whether this route's directory contains (or is) `other`'s directory.
    pub fn is_ancestor_of(&self, other: &AppRoute) -> bool {
        is_dir_prefix(&self.id, &other.id)
    }

    /// Match `pathname` against this route's pattern.
    pub fn exec(&self, pathname: &str) -> Option<RouteParams> {
        self.pattern.exec(pathname)
    }

    fn refresh_client(&mut self) {
        self.client = RouteKind::CLIENT.iter().any(|&kind| self.has(kind));
    }

    fn sort_key(&self) -> (Reverse<i64>, &str) {
        (Reverse(self.score()), self.id.as_str())
    }
}

/// Directory-aware prefix test: `/blog` contains `/blog/post` but not `/blogs`.
pub(crate) fn is_dir_prefix(dir: &str, path: &str) -> bool {
    dir == "/"
        || path == dir
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Routes in `routes` whose directory contains `route`'s, root-most first.
pub fn branch(routes: &[Arc<AppRoute>], route: &AppRoute) -> Vec<Arc<AppRoute>> {
    let mut branch: Vec<_> = routes
        .iter()
        .filter(|r| r.is_ancestor_of(route))
        .cloned()
        .collect();
    branch.sort_by_key(|r| r.depth());
    branch
}

// ============================================================================
// Listeners
// ============================================================================

/// What happened to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteEvent {
    Added,
    Removed,
}

pub type ListenerId = usize;

type Listener = Box<dyn Fn(RouteEvent, &AppRoute) + Send + Sync>;

// ============================================================================
// AppRoutes
// ============================================================================

/// Score-ordered route table.
pub struct AppRoutes {
    routes: Vec<Arc<AppRoute>>,
    matchers: RouteMatchers,
    loader: Arc<dyn ModuleLoader>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: ListenerId,
}

impl AppRoutes {
    pub fn new(matchers: RouteMatchers, loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            routes: Vec::new(),
            matchers,
            loader,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn matchers(&self) -> &RouteMatchers {
        &self.matchers
    }

    pub fn loader(&self) -> &Arc<dyn ModuleLoader> {
        &self.loader
    }

    /// Attach `file` to its directory's route, creating the route if needed.
    ///
    /// Re-adding a file that already occupies its slot replaces the slot with a
    /// fresh module, which is how changed files get reloaded.
    pub fn add(&mut self, file: RouteFile) -> Result<Arc<AppRoute>, RouteError> {
        let slot = RouteSlot {
            module: LazyModule::new(file.clone(), self.loader.clone()),
            file,
        };
        let kind = slot.file.kind;

        if let Some(index) = self.position(&slot.file.route) {
            if let Some(existing) = self.routes[index].slot(kind)
                && existing.file.path != slot.file.path
            {
                return Err(RouteError::DuplicateSlot {
                    route: self.routes[index].id.clone(),
                    kind,
                    existing: existing.file.relative.clone(),
                    incoming: slot.file.relative,
                });
            }

            let route = Arc::make_mut(&mut self.routes[index]);
            *route.slot_mut(kind) = Some(slot);
            route.refresh_client();

            let route = self.routes[index].clone();
            self.notify(RouteEvent::Added, &route);
            return Ok(route);
        }

        let pattern = compile(&slot.file.route, &slot.file.relative, &self.matchers)?;
        let mut route = AppRoute::new(slot.file.route.clone(), pattern);
        *route.slot_mut(kind) = Some(slot);
        route.refresh_client();

        let index = self
            .routes
            .partition_point(|r| r.sort_key() < route.sort_key());
        let route = Arc::new(route);
        self.routes.insert(index, route.clone());
        self.notify(RouteEvent::Added, &route);
        Ok(route)
    }

    /// Detach `file` from its route. Unknown files are ignored.
    ///
    /// Returns the route as it stands after removal (or as it was, when the
    /// route itself was dropped).
    pub fn remove(&mut self, file: &RouteFile) -> Option<Arc<AppRoute>> {
        let index = self.position(&file.route)?;
        if self.routes[index]
            .slot(file.kind)
            .is_none_or(|slot| slot.file.path != file.path)
        {
            return None;
        }

        let route = Arc::make_mut(&mut self.routes[index]);
        *route.slot_mut(file.kind) = None;
        route.refresh_client();

        let route = if route.is_empty() {
            self.routes.remove(index)
        } else {
            self.routes[index].clone()
        };
        self.notify(RouteEvent::Removed, &route);
        Some(route)
    }

    /// Whether any route (optionally only those with `kind`) matches `pathname`.
    pub fn test(&self, pathname: &str, kind: Option<RouteKind>) -> bool {
        self.routes
            .iter()
            .filter(|r| kind.is_none_or(|k| r.has(k)))
            .any(|r| r.pattern.test(pathname))
    }

    /// First route with `kind` matching `pathname`, with its params.
    pub fn match_route(&self, pathname: &str, kind: RouteKind) -> Option<(Arc<AppRoute>, RouteParams)> {
        self.routes
            .iter()
            .filter(|r| r.has(kind))
            .find_map(|r| r.exec(pathname).map(|params| (r.clone(), params)))
    }

    /// Route owning `file`'s directory, if it exposes `file`'s role.
    pub fn find(&self, file: &RouteFile) -> Option<&Arc<AppRoute>> {
        self.get(&file.route).filter(|r| r.has(file.kind))
    }

    /// Route by id.
    pub fn get(&self, id: &str) -> Option<&Arc<AppRoute>> {
        self.position(id).map(|index| &self.routes[index])
    }

    /// Ancestor chain of `route` (inclusive), root-most first.
    pub fn get_branch(&self, route: &AppRoute) -> Vec<Arc<AppRoute>> {
        branch(&self.routes, route)
    }

    /// [`get_branch`](Self::get_branch) restricted to routes with a layout.
    pub fn get_layout_branch(&self, route: &AppRoute) -> Vec<Arc<AppRoute>> {
        self.get_branch(route)
            .into_iter()
            .filter(|r| r.has(RouteKind::Layout))
            .collect()
    }

    /// Routes with any client-facing slot, in table order.
    pub fn filter_client_routes(&self) -> Vec<Arc<AppRoute>> {
        self.routes.iter().filter(|r| r.client).cloned().collect()
    }

    /// Routes exposing `kind`, in table order.
    pub fn filter_has_kind(&self, kind: RouteKind) -> Vec<Arc<AppRoute>> {
        self.routes.iter().filter(|r| r.has(kind)).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AppRoute>> {
        self.routes.iter()
    }

    /// Immutable copy of the current table.
    pub fn snapshot(&self) -> Vec<Arc<AppRoute>> {
        self.routes.clone()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Call `listener` after every add and remove.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(RouteEvent, &AppRoute) + Send + Sync + 'static,
    {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.routes.iter().position(|r| r.id == id)
    }

    fn notify(&self, event: RouteEvent, route: &AppRoute) {
        for (_, listener) in &self.listeners {
            listener(event, route);
        }
    }
}

impl fmt::Debug for AppRoutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppRoutes")
            .field("routes", &self.routes.iter().map(|r| &r.id).collect::<Vec<_>>())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<'a> IntoIterator for &'a AppRoutes {
    type Item = &'a Arc<AppRoute>;
    type IntoIter = std::slice::Iter<'a, Arc<AppRoute>>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::MemoryModuleLoader;
    use parking_lot::Mutex;
    use std::path::Path;

    fn table() -> AppRoutes {
        let matchers = RouteMatchers::new().with("int", r"\d+").unwrap();
        AppRoutes::new(matchers, Arc::new(MemoryModuleLoader::new()))
    }

    fn file(relative: &str) -> RouteFile {
        let kind = match relative.rsplit('/').next().unwrap_or_default() {
            name if name.starts_with("layout") => RouteKind::Layout,
            name if name.starts_with("error") => RouteKind::Error,
            name if name.starts_with("http") => RouteKind::Http,
            _ => RouteKind::Page,
        };
        RouteFile::from_relative(Path::new("/app"), relative, kind)
    }

    fn ids(routes: &AppRoutes) -> Vec<&str> {
        routes.iter().map(|r| r.id.as_str()).collect()
    }

    fn assert_invariants(routes: &AppRoutes) {
        let all: Vec<_> = routes.iter().collect();
        for pair in all.windows(2) {
            assert!(pair[0].score() >= pair[1].score(), "{} before {}", pair[0].id, pair[1].id);
        }
        let mut unique: Vec<_> = all.iter().map(|r| r.id.clone()).collect();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), all.len());
        assert!(all.iter().all(|r| !r.is_empty()));
    }

    #[test]
    fn test_static_route_wins() {
        let mut routes = table();
        routes.add(file("blog/[slug]/page.md")).unwrap();
        routes.add(file("blog/featured/page.md")).unwrap();

        let (route, params) = routes.match_route("/blog/featured", RouteKind::Page).unwrap();
        assert_eq!(route.id, "/blog/featured");
        assert!(params.is_empty());

        let (route, params) = routes.match_route("/blog/other/", RouteKind::Page).unwrap();
        assert_eq!(route.id, "/blog/[slug]");
        assert_eq!(params.get("slug").map(String::as_str), Some("other"));
    }

    #[test]
    fn test_add_then_remove_leaves_nothing() {
        let mut routes = table();
        let about = file("about/page.md");
        routes.add(about.clone()).unwrap();
        assert_eq!(routes.len(), 1);

        routes.remove(&about).unwrap();
        assert!(routes.get("/about").is_none());
        assert!(routes.is_empty());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut routes = table();
        routes.add(file("about/page.md")).unwrap();
        assert!(routes.remove(&file("missing/page.md")).is_none());
        assert!(routes.remove(&file("about/layout.html")).is_none());
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn test_client_flag() {
        let mut routes = table();
        let http = file("api/http.toml");
        let page = file("api/page.html");

        let route = routes.add(http.clone()).unwrap();
        assert!(!route.client);
        let route = routes.add(page.clone()).unwrap();
        assert!(route.client);
        let route = routes.remove(&page).unwrap();
        assert!(!route.client);
        assert!(route.has(RouteKind::Http));
        assert_eq!(routes.filter_client_routes().len(), 0);
        assert_eq!(routes.filter_has_kind(RouteKind::Http).len(), 1);
    }

    #[test]
    fn test_duplicate_slot() {
        let mut routes = table();
        routes.add(file("about/page.md")).unwrap();
        let err = routes.add(file("about/page.html")).unwrap_err();
        assert!(matches!(err, RouteError::DuplicateSlot { kind: RouteKind::Page, .. }));
        // Re-adding the same file refreshes it.
        routes.add(file("about/page.md")).unwrap();
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn test_unknown_matcher_rejected() {
        let mut routes = table();
        assert!(matches!(
            routes.add(file("posts/[id=uuid]/page.md")),
            Err(RouteError::UnknownMatcher { .. })
        ));
        assert!(routes.is_empty());
    }

    #[test]
    fn test_test_and_find() {
        let mut routes = table();
        routes.add(file("docs/[...rest]/page.md")).unwrap();
        routes.add(file("api/http.toml")).unwrap();

        assert!(routes.test("/docs/a/b", None));
        assert!(routes.test("/api", None));
        assert!(!routes.test("/api", Some(RouteKind::Page)));
        assert!(!routes.test("/nowhere", None));

        assert!(routes.find(&file("api/http.toml")).is_some());
        assert!(routes.find(&file("api/page.md")).is_none());
    }

    #[test]
    fn test_branch() {
        let mut routes = table();
        for f in [
            "layout.html",
            "blog/layout.html",
            "blog/[slug]/page.md",
            "blogs/page.md",
            "blog/error.html",
            "about/page.md",
        ] {
            routes.add(file(f)).unwrap();
        }

        let post = routes.get("/blog/[slug]").unwrap().clone();
        let branch: Vec<_> = routes.get_branch(&post).iter().map(|r| r.id.clone()).collect();
        assert_eq!(branch, vec!["/", "/blog", "/blog/[slug]"]);

        let layouts: Vec<_> = routes
            .get_layout_branch(&post)
            .iter()
            .map(|r| r.id.clone())
            .collect();
        assert_eq!(layouts, vec!["/", "/blog"]);
    }

    #[test]
    fn test_branch_contains_every_prefix() {
        let mut routes = table();
        let dirs = ["", "a/", "a/b/", "a/b/[c]/", "a/[x]/", "a/b/[c]/d/"];
        for dir in dirs {
            routes.add(file(&format!("{dir}page.md"))).unwrap();
        }
        for outer in routes.snapshot() {
            for inner in routes.snapshot() {
                if is_dir_prefix(&outer.id, &inner.id) {
                    assert!(routes.get_branch(&inner).iter().any(|r| r.id == outer.id));
                }
            }
        }
    }

    #[test]
    fn test_order_is_independent_of_insertion() {
        let files = ["[a]/page.md", "[b]/page.md", "x/page.md", "page.md", "[...rest]/page.md"];

        let mut forward = table();
        for f in files {
            forward.add(file(f)).unwrap();
        }
        let mut backward = table();
        for f in files.iter().rev() {
            backward.add(file(f)).unwrap();
        }

        assert_eq!(ids(&forward), ids(&backward));
        assert_eq!(ids(&forward), vec!["/x", "/[a]", "/[b]", "/", "/[...rest]"]);
    }

    #[test]
    fn test_random_add_remove_keeps_invariants() {
        let pool = [
            "page.md",
            "layout.html",
            "blog/page.md",
            "blog/layout.html",
            "blog/[slug]/page.md",
            "blog/[slug]/http.toml",
            "blog/featured/page.md",
            "docs/[[...rest]]/page.md",
            "docs/[...rest]/error.html",
            "posts/[id=int]/page.md",
            "[[lang]]/page.md",
            "(marketing)/pricing/page.md",
        ];

        let mut routes = table();
        let mut seed: u64 = 0x5eed;
        for _ in 0..500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let pick = pool[(seed >> 33) as usize % pool.len()];
            if (seed >> 13) & 1 == 0 {
                routes.add(file(pick)).unwrap();
            } else {
                routes.remove(&file(pick));
            }
            assert_invariants(&routes);
        }
    }

    #[test]
    fn test_listeners() {
        let mut routes = table();
        let events = Arc::new(Mutex::new(Vec::new()));

        let sink = events.clone();
        let id = routes.subscribe(move |event, route| sink.lock().push((event, route.id.clone())));

        let about = file("about/page.md");
        routes.add(about.clone()).unwrap();
        routes.remove(&about);
        assert!(routes.unsubscribe(id));
        routes.add(about).unwrap();

        assert_eq!(
            *events.lock(),
            vec![
                (RouteEvent::Added, "/about".to_string()),
                (RouteEvent::Removed, "/about".to_string()),
            ]
        );
        assert!(!routes.unsubscribe(id));
    }

    #[test]
    fn test_snapshot_is_immutable() {
        let mut routes = table();
        routes.add(file("about/page.md")).unwrap();
        let before = routes.snapshot();
        routes.add(file("about/layout.html")).unwrap();

        assert!(!before[0].has(RouteKind::Layout));
        assert!(routes.get("/about").unwrap().has(RouteKind::Layout));
    }
}
