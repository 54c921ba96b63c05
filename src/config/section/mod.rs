//! Configuration section definitions.
//!
//! Each module corresponds to a section in `vessel.toml`:
//!
//! | Module   | TOML Section | Purpose                                   |
//! |----------|--------------|-------------------------------------------|
//! | `app`    | `[app]`      | Project directories, base URL, template   |
//! | `routes` | `[routes]`   | Entries, matchers, route file globs, logs |
//! | `build`  | `[build]`    | Adapter, concurrency, sitemap, vercel     |
//! | `serve`  | `[serve]`    | Development server                        |

mod app;
mod build;
mod routes;
mod serve;

pub use app::AppConfig;
pub use build::{AdapterKind, BuildConfig, SitemapConfig, VercelConfig};
pub use routes::{MatcherConfig, RouteGlobConfig, RouteLogLevel, RouteLogStyle, RoutesConfig};
pub use serve::ServeConfig;
