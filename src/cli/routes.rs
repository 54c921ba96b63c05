//! `vessel routes`: print the route table in match order.

use std::fmt::Write;

use anyhow::Result;
use owo_colors::OwoColorize;

use super::RoutesStyle;
use super::build::load_routes;
use crate::config::VesselConfig;
use crate::routing::{AppRoute, AppRoutes, RouteKind};

pub fn print_routes(config: &VesselConfig, style: RoutesStyle) -> Result<()> {
    let routes = load_routes(config)?;
    if routes.is_empty() {
        crate::log!("routes"; "no route files in {}", config.root_relative(config.app_dir()).display());
        return Ok(());
    }
    print!("{}", format_routes(&routes, style));
    Ok(())
}

pub fn format_routes(routes: &AppRoutes, style: RoutesStyle) -> String {
    match style {
        RoutesStyle::List => format_list(routes),
        RoutesStyle::Tree => format_tree(routes),
    }
}

fn slots(route: &AppRoute) -> String {
    RouteKind::ALL
        .into_iter()
        .filter(|&kind| route.has(kind))
        .map(RouteKind::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One line per route: score, id, pathname pattern, slots.
fn format_list(routes: &AppRoutes) -> String {
    let width = routes.iter().map(|r| r.id.len()).max().unwrap_or(0);
    let mut out = String::new();
    for route in routes.iter() {
        let _ = writeln!(
            out,
            "{:>12}  {:<width$}  {}  {}",
            route.score().dimmed(),
            route.id,
            route.pathname().cyan(),
            format!("[{}]", slots(route)).dimmed(),
        );
    }
    out
}

/// Routes nested under their closest ancestor, children in match order.
fn format_tree(routes: &AppRoutes) -> String {
    let all: Vec<&AppRoute> = routes.iter().map(|r| r.as_ref()).collect();
    let parents: Vec<Option<usize>> = all
        .iter()
        .map(|route| {
            all.iter()
                .enumerate()
                .filter(|(_, other)| other.id != route.id && other.is_ancestor_of(route))
                .max_by_key(|(_, other)| other.depth())
                .map(|(i, _)| i)
        })
        .collect();

    let mut out = String::new();
    let tree = Tree {
        all: &all,
        parents: &parents,
    };
    let roots = tree.children(None);
    for (i, &root) in roots.iter().enumerate() {
        tree.write_node(&mut out, root, "", i + 1 == roots.len());
    }
    out
}

struct Tree<'a> {
    all: &'a [&'a AppRoute],
    parents: &'a [Option<usize>],
}

impl Tree<'_> {
    fn children(&self, parent: Option<usize>) -> Vec<usize> {
        (0..self.all.len())
            .filter(|&i| self.parents[i] == parent)
            .collect()
    }

    fn write_node(&self, out: &mut String, index: usize, prefix: &str, last: bool) {
        let route = self.all[index];
        let branch = if last { "└── " } else { "├── " };
        let _ = writeln!(
            out,
            "{prefix}{branch}{}  {}  {}",
            route.id,
            format!("[{}]", slots(route)).dimmed(),
            route.score().dimmed(),
        );

        let children = self.children(Some(index));
        let prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
        for (i, &child) in children.iter().enumerate() {
            self.write_node(out, child, &prefix, i + 1 == children.len());
        }
    }
}
