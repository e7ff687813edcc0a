//! element-router CLI tool
//!
//! Headless inspection of route configurations.
//!
//! ## Commands
//!
//! - `tree <config>`: print the route tree
//! - `url <pattern> [key=value...]`: fill a route pattern with parameter values
//! - `simulate <config> <path>...`: navigate an in-memory document through each path and
//!   print the routing hooks that ran and the resulting markup

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use element_router::{
    config::{RouteConfig, RouterOptions},
    context::Context,
    dispatch::MemoryDispatcher,
    dom::MemoryDocument,
    router::Router,
    routing::{EnterOutcome, RoutingCapable},
    tree::{RouteNode, Traversal},
    RouterError,
};
use std::{cell::RefCell, path::PathBuf, rc::Rc};

#[derive(Parser)]
#[command(name = "element-router")]
#[command(author, version, about = "Inspect and simulate element route trees", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the route tree of a TOML or JSON route configuration
    Tree {
        /// Route configuration file (.toml or .json)
        config: PathBuf,
    },

    /// Fill the placeholders of a route pattern
    Url {
        /// Route pattern, e.g. '/users/:userId([0-9]+)'
        pattern: String,

        /// Parameter values as key=value; unknown keys become query parameters
        params: Vec<String>,
    },

    /// Navigate through paths with an in-memory document and print what happened
    Simulate {
        /// Route configuration file (.toml or .json)
        config: PathBuf,

        /// Paths to navigate to, in order
        #[arg(required = true)]
        paths: Vec<String>,

        /// Router options file (TOML)
        #[arg(short, long)]
        options: Option<PathBuf>,
    },
}

/// Routing hooks that record each call before delegating to the router's default hooks.
struct TracingRouting {
    inner: Rc<dyn RoutingCapable>,
    trace: Rc<RefCell<Vec<String>>>,
}

#[async_trait(?Send)]
impl RoutingCapable for TracingRouting {
    async fn route_enter(
        &self,
        current: &RouteNode,
        next: Option<&RouteNode>,
        route_id: &str,
        ctx: &Context,
    ) -> Result<EnterOutcome, RouterError> {
        self.trace
            .borrow_mut()
            .push(format!("enter {}", current.key()));
        self.inner.route_enter(current, next, route_id, ctx).await
    }

    async fn route_exit(
        &self,
        current: &RouteNode,
        next: Option<&RouteNode>,
        route_id: &str,
        ctx: &Context,
    ) -> Result<(), RouterError> {
        self.trace.borrow_mut().push(format!("exit {}", current.key()));
        self.inner.route_exit(current, next, route_id, ctx).await
    }
}

fn print_tree(node: &RouteNode) {
    node.traverse(&mut |node| {
        let depth = node.ancestors().len();
        let record = node.value();
        let path = if record.is_abstract() {
            "(abstract)"
        } else {
            record.path.as_str()
        };
        let auth = if node.requires_authentication() {
            "auth"
        } else {
            "public"
        };
        println!(
            "{}{} {path} <{}> [{auth}]",
            "  ".repeat(depth),
            node.key(),
            record.tag_name.to_lowercase()
        );
        Traversal::Continue
    });
}

fn parse_params(params: &[String]) -> Result<Vec<(String, String)>, RouterError> {
    params
        .iter()
        .map(|param| {
            param
                .split_once('=')
                .map(|(key, val)| (key.to_string(), val.to_string()))
                .ok_or_else(|| {
                    RouterError::Serialization(format!("expected key=value, got '{param}'"))
                })
        })
        .collect()
}

async fn simulate(
    config: RouteConfig,
    options: RouterOptions,
    paths: Vec<String>,
) -> Result<(), RouterError> {
    let initial = paths.first().cloned().unwrap_or_else(|| "/".to_string());
    let dispatcher = MemoryDispatcher::new(&initial);
    let router = Router::with_routes(&config, dispatcher.clone(), options)?;
    let root = router
        .route_tree()
        .ok_or_else(|| RouterError::NotFound("empty route tree".to_string()))?;

    let trace = Rc::new(RefCell::new(Vec::new()));
    let routing: Rc<dyn RoutingCapable> = Rc::new(TracingRouting {
        inner: router.reconciler(),
        trace: trace.clone(),
    });
    let document = MemoryDocument::new();
    root.traverse(&mut |node| {
        document.define(&node.tag_name(), Some(routing.clone()));
        Traversal::Continue
    });
    let root_element = document.element(&root.tag_name())?;
    router.set_root_element(root_element.clone())?;

    router.add_route_change_complete_callback(|err| {
        if let Some(err) = err {
            eprintln!("  error: {err}");
        }
        Ok(())
    });

    println!("start {initial}");
    router.start().await?;
    report(&router, &trace, &root_element.markup());

    for path in paths.iter().skip(1) {
        println!("go {path}");
        router.go(path, Vec::<(String, String)>::new()).await?;
        report(&router, &trace, &root_element.markup());
    }

    let unhandled = dispatcher.unhandled();
    if !unhandled.is_empty() {
        println!("unhandled: {}", unhandled.join(", "));
    }
    Ok(())
}

fn report(router: &Router, trace: &Rc<RefCell<Vec<String>>>, markup: &str) {
    for line in trace.borrow_mut().drain(..) {
        println!("  {line}");
    }
    println!(
        "  active: {}",
        router.current_node_id().unwrap_or_else(|| "-".to_string())
    );
    println!("  {markup}");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tree { config } => {
            let config = RouteConfig::load(&config)?;
            let root = Router::build_route_tree(&config)?;
            print_tree(&root);
        }
        Commands::Url { pattern, params } => {
            let params = parse_params(&params)?;
            println!("{}", Router::url(&pattern, params)?);
        }
        Commands::Simulate {
            config,
            paths,
            options,
        } => {
            let config = RouteConfig::load(&config)?;
            let options = match options {
                Some(path) => RouterOptions::from_toml_str(&std::fs::read_to_string(path)?)?,
                None => RouterOptions::default(),
            };

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(simulate(config, options, paths))?;
        }
    }

    Ok(())
}
