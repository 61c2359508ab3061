mod logger;

use pj_core::PjaxError;
use pj_core::PjaxResult;
use pj_js::JsRuntimeConfig;
use pj_js::PageNavigation;
use pj_js::PageRuntime;
use pj_js::ScriptHost;
use pj_net::HttpClient;
use pj_net::HttpMethod;
use pj_net::TlsPolicy;
use pj_pjax::EventBus;
use pj_pjax::Fetcher;
use pj_pjax::History;
use pj_pjax::Host;
use pj_pjax::HttpFetcher;
use pj_pjax::MemoryHistory;
use pj_pjax::MemoryWindow;
use pj_pjax::NavigationOutcome;
use pj_pjax::Options;
use pj_pjax::Pjax;
use pj_pjax::events::PJAX_CONTENT;
use pj_pjax::events::PJAX_FETCH;
use pj_pjax::events::PJAX_LOAD;
use pj_pjax::events::PJAX_READY;
use pj_pjax::events::PJAX_UNLOAD;
use pj_pjax::host::FetchRequest;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

const USAGE: &str = "usage: pjax-shell <url> [--area SELECTOR]... [--navigate URL]... [--timeout MILLIS]";

#[derive(Debug, Clone, PartialEq, Eq)]
struct ShellArgs {
    url: String,
    areas: Vec<String>,
    navigations: Vec<String>,
    timeout: Option<Duration>,
}

fn main() {
    if let Err(error) = logger::install() {
        eprintln!("pjax-shell startup error: {error}");
        return;
    }
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(error) => {
            eprintln!("pjax-shell startup error: {error}");
            eprintln!("{USAGE}");
            return;
        }
    };
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("pjax-shell startup error: {error}");
            return;
        }
    };
    if let Err(error) = runtime.block_on(run(args)) {
        eprintln!("pjax-shell: {error}");
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<ShellArgs, String> {
    let mut url = None;
    let mut areas = Vec::new();
    let mut navigations = Vec::new();
    let mut timeout = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--area" => {
                let area = args
                    .next()
                    .ok_or_else(|| "missing selector after --area".to_owned())?;
                areas.push(area);
            }
            "--navigate" => {
                let target = args
                    .next()
                    .ok_or_else(|| "missing url after --navigate".to_owned())?;
                navigations.push(target);
            }
            "--timeout" => {
                let millis = args
                    .next()
                    .ok_or_else(|| "missing milliseconds after --timeout".to_owned())?;
                let millis = millis
                    .parse::<u64>()
                    .map_err(|_| format!("invalid timeout `{millis}`"))?;
                timeout = Some(Duration::from_millis(millis));
            }
            flag if flag.starts_with("--") => return Err(format!("unknown option `{flag}`")),
            _ if url.is_none() => url = Some(arg),
            _ => return Err(format!("unexpected argument `{arg}`")),
        }
    }
    let url = url.ok_or_else(|| "missing start url".to_owned())?;
    Ok(ShellArgs {
        url,
        areas,
        navigations,
        timeout,
    })
}

async fn run(args: ShellArgs) -> PjaxResult<()> {
    let fetcher = Rc::new(HttpFetcher::new(HttpClient::new(TlsPolicy::default())?));
    let response = fetcher
        .fetch(FetchRequest {
            method: HttpMethod::Get,
            url: args.url.clone(),
            headers: Vec::new(),
            body: None,
        })
        .await?;
    if !(200..300).contains(&response.status) {
        return Err(PjaxError::new(
            "shell.load.status",
            format!("{}: {} {}", response.url, response.status, response.status_text),
        ));
    }
    let document = pj_html::parse(&response.body, &response.url)?;
    log::info!("loaded {} ({})", response.url, document.title());

    let history = Rc::new(MemoryHistory::new(&response.url));
    let window = Rc::new(MemoryWindow::new());
    let runtime = Rc::new(RefCell::new(PageRuntime::new(JsRuntimeConfig::default())?));
    let scripts: Rc<RefCell<dyn ScriptHost>> = runtime.clone();
    let events = EventBus::new();
    for name in [PJAX_FETCH, PJAX_UNLOAD, PJAX_CONTENT, PJAX_READY, PJAX_LOAD] {
        events.on(name, move |_| log::debug!("{name}"));
    }
    let host = Host::new(
        document.clone(),
        history.clone(),
        window.clone(),
        fetcher,
        scripts,
        events,
    );

    let mut options = Options::default();
    if !args.areas.is_empty() {
        options.areas = Some(args.areas.clone());
    }
    options.fetch.timeout = args.timeout;
    let pjax = Pjax::new(&options, host);

    for target in &args.navigations {
        let outcome = pjax.assign(target).await;
        match &outcome {
            NavigationOutcome::Completed => {
                println!("{} -> {}", target, history.location());
            }
            NavigationOutcome::Canceled => println!("{target}: canceled"),
            NavigationOutcome::FellBack(reason) => {
                println!("{target}: fell back ({reason})");
                for assigned in window.assignments() {
                    println!("  native navigation to {assigned}");
                }
            }
            NavigationOutcome::Failed(reason) => println!("{target}: failed ({reason})"),
            NavigationOutcome::Declined(reason) => println!("{target}: declined ({reason})"),
        }
        match runtime.borrow_mut().take_navigation() {
            Some(PageNavigation::Assign(href)) => println!("  script requested {href}"),
            Some(PageNavigation::Reload) => println!("  script requested a reload"),
            None => {}
        }
    }

    println!("title: {}", document.title());
    println!("url: {}", pjax.document_url());
    println!("scripts: {}", pjax.scripts().len());
    for area in &pjax.config().areas {
        for node in document.query_selector_all(document.root(), area)? {
            println!("{}", document.outer_html(node));
        }
    }
    Ok(())
}
