//! Route report printed when a build closes.

use owo_colors::OwoColorize;

use super::BuildData;
use crate::config::{RouteLogLevel, RouteLogStyle};

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const VERTICAL: &str = "│   ";
const INDENT: &str = "    ";

/// Print the route report in `style`, filtered by `level`.
pub fn log_routes(data: &BuildData, style: RouteLogStyle, level: RouteLogLevel) {
    let report = match style {
        RouteLogStyle::None => return,
        RouteLogStyle::List => format_routes_list(data, level),
        RouteLogStyle::Tree => format_routes_tree(data, level),
    };
    if !report.is_empty() {
        println!("{report}\n");
    }
}

/// Print every bad link with its reason and the route linking to it.
pub fn log_bad_links(data: &BuildData) {
    let report = format_bad_links(data);
    if !report.is_empty() {
        println!("{report}");
    }
}

fn heading(title: &str) -> String {
    format!("\n{}\n", title.bold().underline())
}

pub fn format_bad_links(data: &BuildData) -> String {
    if data.bad_links.is_empty() {
        return String::new();
    }
    let mut lines = vec![heading("BAD LINKS")];
    for (pathname, bad) in &data.bad_links {
        lines.push(format!("- {}", pathname.bold()));
        lines.push(format!("  - Reason: {}", bad.reason));
        if let Some(referrer) = &bad.referrer {
            lines.push(format!("  - Location: {referrer}"));
        }
    }
    lines.join("\n")
}

// ============================================================================
// List
// ============================================================================

pub fn format_routes_list(data: &BuildData, level: RouteLogLevel) -> String {
    let mut lines = Vec::new();
    let info = level == RouteLogLevel::Info;

    if info && !data.static_renders.is_empty() {
        lines.push(heading("STATIC PAGES"));
        for render in data.static_renders.values() {
            let route = if render.pathname.as_str().trim_end_matches('/')
                == render.route_id.trim_end_matches('/')
            {
                String::new()
            } else {
                format!(" ({})", render.route_id).dimmed().to_string()
            };
            lines.push(format!("- {}{route}", render.filename.cyan()));
        }
    }

    if info && !data.server_pages.is_empty() {
        lines.push(heading("SERVER PAGES"));
        for id in data.server_pages.keys() {
            lines.push(format!("- {}", id.cyan()));
        }
    }

    if info && !data.server_endpoints.is_empty() {
        lines.push(heading("SERVER ENDPOINTS"));
        for id in data.server_endpoints.keys() {
            let edge = if data.edge_routes.contains(id) { " (edge)" } else { "" };
            lines.push(format!("- {}{}", id.cyan(), edge.dimmed()));
        }
    }

    if level <= RouteLogLevel::Warn && !data.static_redirects.is_empty() {
        lines.push(heading("STATIC REDIRECTS"));
        for redirect in data.static_redirects.values() {
            lines.push(format!(
                "- {} -> {} ({})",
                redirect.from.yellow(),
                redirect.to.yellow(),
                redirect.status
            ));
        }
    }

    if !data.bad_links.is_empty() {
        lines.push(heading("NOT FOUND"));
        for link in data.bad_links.keys() {
            lines.push(format!("- {} (404)", link.red()));
        }
    }

    lines.join("\n")
}

// ============================================================================
// Tree
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mark {
    BadLink,
    Redirect { to: String, status: u16 },
    Static,
    ServerPage,
    ServerHttp,
}

#[derive(Debug, Default)]
struct TreeDir {
    name: String,
    children: Vec<TreeDir>,
    mark: Option<Mark>,
}

impl TreeDir {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Mark the node at `link`, creating intermediate directories. A node
    /// keeps the first mark it receives.
    fn insert(&mut self, link: &str, mark: Mark) {
        let mut current = self;
        for segment in link.split('/').filter(|s| !s.is_empty()) {
            let index = match current.children.iter().position(|d| d.name == segment) {
                Some(index) => index,
                None => {
                    current.children.push(TreeDir::new(segment));
                    current.children.len() - 1
                }
            };
            current = &mut current.children[index];
        }
        current.mark.get_or_insert(mark);
    }

    fn label(&self) -> String {
        match &self.mark {
            Some(Mark::BadLink) => format!("{} {}", self.name.red(), "(404)".red().bold()),
            Some(Mark::Redirect { to, status }) => {
                format!("{} -> {} ({status})", self.name, to.trim_matches('/'))
                    .yellow()
                    .to_string()
            }
            Some(Mark::Static) => self.name.cyan().to_string(),
            Some(Mark::ServerPage) => self.name.magenta().to_string(),
            Some(Mark::ServerHttp) => format!("{}{}", self.name.magenta(), "+http".dimmed()),
            None => self.name.clone(),
        }
    }

    fn print(&self, prefix: &str, lines: &mut Vec<String>) {
        let count = self.children.len();
        for (index, dir) in self.children.iter().enumerate() {
            let last = index + 1 == count;
            let branch = if last { LAST_BRANCH } else { BRANCH };
            lines.push(format!("{prefix}{branch}{}", dir.label().bold()));
            let next = format!("{prefix}{}", if last { INDENT } else { VERTICAL });
            dir.print(&next, lines);
        }
    }
}

pub fn format_routes_tree(data: &BuildData, level: RouteLogLevel) -> String {
    let mut tree = TreeDir::new(".");

    for link in data.bad_links.keys() {
        tree.insert(link, Mark::BadLink);
    }
    if level <= RouteLogLevel::Warn {
        for redirect in data.static_redirects.values() {
            tree.insert(
                &redirect.from,
                Mark::Redirect {
                    to: redirect.to.clone(),
                    status: redirect.status,
                },
            );
        }
    }
    if level == RouteLogLevel::Info {
        for link in data.links.keys() {
            tree.insert(link, Mark::Static);
        }
        for pathname in data.server_pages.values() {
            tree.insert(pathname, Mark::ServerPage);
        }
        for pathname in data.server_endpoints.values() {
            tree.insert(pathname, Mark::ServerHttp);
        }
    }

    if tree.children.is_empty() {
        return String::new();
    }

    let mut lines = Vec::new();
    if level == RouteLogLevel::Info {
        lines.push(heading("ROUTES"));
    }
    let root = if data.links.contains_key("/") {
        ".".cyan().bold().to_string()
    } else {
        ".".magenta().bold().to_string()
    };
    lines.push(root);
    tree.print("", &mut lines);
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BadLink, StaticRender};
    use crate::core::UrlPath;
    use crate::http::Redirect;
    use crate::render::RenderOutput;

    fn data() -> BuildData {
        let mut data = BuildData::default();
        for (pathname, route) in [("/", "/"), ("/blog/", "/blog"), ("/blog/hello/", "/blog/[slug]")] {
            let path = UrlPath::from_decoded(pathname);
            data.links.insert(pathname.into(), route.into());
            data.static_renders.insert(
                pathname.into(),
                StaticRender {
                    filename: path.to_output_filename(),
                    route_id: route.into(),
                    pathname: path,
                    output: RenderOutput::default(),
                    static_data: Vec::new(),
                },
            );
        }
        data.insert_redirect(
            &UrlPath::from_decoded("/old/"),
            "old/index.html".into(),
            &Redirect::new("/blog/", 308).unwrap(),
        );
        data.bad_links.insert(
            "/missing/".into(),
            BadLink {
                pathname: "/missing/".into(),
                reason: "no matching page route".into(),
                referrer: Some("/blog".into()),
            },
        );
        data.server_endpoints.insert("/api".into(), "/api".into());
        data
    }

    #[test]
    fn test_tree_levels() {
        let data = data();

        let error = format_routes_tree(&data, RouteLogLevel::Error);
        assert!(error.contains("missing"));
        assert!(!error.contains("old"));
        assert!(!error.contains("hello"));

        let warn = format_routes_tree(&data, RouteLogLevel::Warn);
        assert!(warn.contains("old -> blog (308)"));
        assert!(!warn.contains("hello"));

        let info = format_routes_tree(&data, RouteLogLevel::Info);
        assert!(info.contains("ROUTES"));
        assert!(info.contains("hello"));
        assert!(info.contains("+http"));
    }

    #[test]
    fn test_tree_shape() {
        let mut tree = TreeDir::new(".");
        tree.insert("/a/b/", Mark::Static);
        tree.insert("/a/c/", Mark::Static);
        tree.insert("/d/", Mark::BadLink);

        let mut lines = Vec::new();
        tree.print("", &mut lines);
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with(BRANCH));
        assert!(lines[1].starts_with(&format!("{VERTICAL}{BRANCH}")));
        assert!(lines[2].starts_with(&format!("{VERTICAL}{LAST_BRANCH}")));
        assert!(lines[3].starts_with(LAST_BRANCH));
    }

    #[test]
    fn test_list_sections() {
        let data = data();
        let info = format_routes_list(&data, RouteLogLevel::Info);
        assert!(info.contains("STATIC PAGES"));
        assert!(info.contains("blog/hello/index.html"));
        assert!(info.contains("SERVER ENDPOINTS"));
        assert!(info.contains("STATIC REDIRECTS"));
        assert!(info.contains("NOT FOUND"));

        let error = format_routes_list(&data, RouteLogLevel::Error);
        assert!(!error.contains("STATIC PAGES"));
        assert!(!error.contains("STATIC REDIRECTS"));
        assert!(error.contains("NOT FOUND"));
    }

    #[test]
    fn test_bad_links_report() {
        let report = format_bad_links(&data());
        assert!(report.contains("BAD LINKS"));
        assert!(report.contains("Reason: no matching page route"));
        assert!(report.contains("Location: /blog"));
        assert!(format_bad_links(&BuildData::default()).is_empty());
    }
}
