//! Hello Example
//!
//! One package answering the same routes from a web server and a shell.
//!
//! # Usage
//!
//! ```bash
//! # command line: argv[0] names the route
//! cargo build --package hello
//! cp target/debug/hello ./greet && ./greet Ada --shout --times 2
//! ./target/debug/hello --name=Ada
//!
//! # gateway mode, as a web server would start it
//! GATEWAY_INTERFACE=CGI/1.1 REQUEST_METHOD=GET REQUEST_URI='/hello?name=Ada' \
//!     ./target/debug/hello
//! ```

use std::collections::BTreeMap;

use clap::Parser;
use tracing::info;
use trellis::prelude::*;

/// Arguments of the `greet` command.
#[derive(Parser, Debug, Clone)]
#[command(name = "greet", about = "Greets someone from the command line")]
struct GreetArgs {
    /// Who to greet.
    name: String,

    /// Print in capitals.
    #[arg(long)]
    shout: bool,

    /// Repeat the greeting.
    #[arg(long, default_value_t = 1)]
    times: u8,
}

struct Hello;

impl Package for Hello {
    fn name(&self) -> &str {
        "hello"
    }

    fn events(&self, ctx: &EventsContext<'_>) -> FrameworkResult<()> {
        ctx.dispatcher().listen(|event: &RequestHandled| {
            info!(
                method = %event.method,
                path = %event.path,
                status = event.status.as_u16(),
                "Handled"
            );
        });
        Ok(())
    }

    fn settings(&self, ctx: &SettingsContext<'_>) -> FrameworkResult<()> {
        ctx.settings().update_section(|template: &mut TemplateConfig| {
            template.site.get_or_insert_with(|| "Hello".to_string());
        })?;
        Ok(())
    }

    fn middleware(&self, framework: &Framework) -> FrameworkResult<()> {
        let site = framework.settings().section::<TemplateConfig>()?.site;
        framework.app().add_middleware(move |mut request: Request, next: Next| {
            let site = site.clone();
            async move {
                if let Some(site) = site {
                    request.set_attribute("site", site);
                }
                next.run(request).await
            }
        });
        Ok(())
    }

    fn routes(&self, framework: &Framework) -> FrameworkResult<()> {
        let app = framework.app();
        app.get("/hello", hello).name("hello");
        app.get("/hello/json", hello_json);
        app.route_service(
            Method::GET,
            "/greet",
            CommandLayer::<GreetArgs>::new().handler(greet),
        )
        .name("greet");
        Ok(())
    }
}

/// `GET /hello?name=…`, or `hello --name=…` from a shell.
async fn hello(request: Request) -> String {
    let name = request.query_param("name").unwrap_or_else(|| "world".to_string());
    let site = request.attribute("site").unwrap_or("Hello");
    format!("[{site}] Hello, {name}!\n")
}

/// `GET /hello/json?name=…`, readable from any origin.
async fn hello_json(request: Request) -> Result<Response, BoxError> {
    let name = request.query_param("name").unwrap_or_else(|| "world".to_string());
    let body = BTreeMap::from([("greeting", format!("Hello, {name}!"))]);
    Ok(Response::json(&body)?.with_cors("*")?)
}

/// Only reachable from a shell, invoked as `greet`.
async fn greet(request: Request) -> Result<String, BoxError> {
    let args =
        CommandArgs::<GreetArgs>::from_request(&request).ok_or("greet arguments missing")?;
    let mut line = format!("Hello, {}!", args.name);
    if args.shout {
        line = line.to_uppercase();
    }
    Ok(std::iter::repeat_n(line, usize::from(args.times.max(1)))
        .map(|line| line + "\n")
        .collect())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> RuntimeResult<()> {
    Runtime::new().package(Hello).execute().await
}
