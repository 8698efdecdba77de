//! Forwards the host application's errors to the monitoring service.
//!
//! The host keeps its own reporting pipeline behind [`ExceptionHandler`].
//! [`MonitoringErrorHandler`] wraps it: the host's handler always runs first
//! and unchanged, then qualifying errors are shipped as [`ErrorRecord`]s.

use axum::http::{Request, header};
use chrono::Utc;
use std::any::Any;
use std::backtrace::Backtrace;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::panic::{self, Location, PanicHookInfo};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::db::enums::ErrorLevel;
use crate::monitor::client::MonitoringClient;
use crate::monitor::config::MonitorConfig;
use crate::monitor::models::{AuthenticatedUser, ErrorRecord};

const UNKNOWN: &str = "unknown";

/// Runtime category of an error, as supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Unrecoverable fault in the runtime itself, such as a panic.
    RuntimeFault,
    /// An error the host declared and propagated.
    Checked,
    /// Bad input handed to an operation.
    InvalidArgument,
    Other,
}

impl ErrorCategory {
    pub fn level(self) -> ErrorLevel {
        match self {
            ErrorCategory::RuntimeFault => ErrorLevel::Critical,
            ErrorCategory::Checked => ErrorLevel::Error,
            ErrorCategory::InvalidArgument => ErrorLevel::Warning,
            ErrorCategory::Other => ErrorLevel::Error,
        }
    }
}

/// An error surfaced by the host, with the details a report needs.
#[derive(Debug, Clone)]
pub struct Exception {
    /// Type name, matched against "don't report" lists.
    pub kind: String,
    pub category: ErrorCategory,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub trace: String,
}

impl Exception {
    /// Captures the caller's location and a backtrace.
    #[track_caller]
    pub fn new(kind: impl Into<String>, category: ErrorCategory, message: impl Into<String>) -> Self {
        let location = Location::caller();
        Self {
            kind: kind.into(),
            category,
            message: message.into(),
            file: location.file().to_string(),
            line: location.line(),
            trace: Backtrace::force_capture().to_string(),
        }
    }

    /// Builds an exception from any error value. The trace lists the source
    /// chain ahead of the backtrace.
    #[track_caller]
    pub fn from_error<E: Error + ?Sized>(err: &E, category: ErrorCategory) -> Self {
        let mut exception = Self::new(std::any::type_name::<E>(), category, err.to_string());

        let mut chain = String::new();
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(chain, "Caused by: {cause}");
            source = cause.source();
        }
        if !chain.is_empty() {
            exception.trace = format!("{chain}{}", exception.trace);
        }
        exception
    }
}

/// Request details attached to an error report. Missing values are sent as
/// `unknown`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub request_url: Option<String>,
    pub request_method: Option<String>,
}

impl RequestContext {
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let headers = req.headers();
        let header_str = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let ip_address = header_str(header::HeaderName::from_static("x-forwarded-for"))
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .or_else(|| {
                req.extensions()
                    .get::<axum::extract::ConnectInfo<SocketAddr>>()
                    .map(|info| info.0.ip().to_string())
            });

        let uri = req.uri();
        let request_url = if uri.scheme().is_some() {
            Some(uri.to_string())
        } else {
            let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
            Some(match header_str(header::HOST) {
                Some(host) => format!("http://{host}{path}"),
                None => path.to_string(),
            })
        };

        Self {
            user_id: req
                .extensions()
                .get::<AuthenticatedUser>()
                .map(|user| user.id.clone()),
            ip_address,
            user_agent: header_str(header::USER_AGENT),
            request_url,
            request_method: Some(req.method().to_string()),
        }
    }
}

/// The host application's own error pipeline.
pub trait ExceptionHandler: Send + Sync {
    fn report(&self, exception: &Exception);

    fn should_report(&self, exception: &Exception) -> bool;
}

/// Stock host handler: logs through `tracing` unless the error's kind is on
/// the "don't report" list.
#[derive(Debug, Clone, Default)]
pub struct LoggingExceptionHandler {
    dont_report: HashSet<String>,
}

impl LoggingExceptionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dont_report(mut self, kind: impl Into<String>) -> Self {
        self.dont_report.insert(kind.into());
        self
    }
}

impl ExceptionHandler for LoggingExceptionHandler {
    fn report(&self, exception: &Exception) {
        if !self.should_report(exception) {
            return;
        }
        error!(
            kind = %exception.kind,
            file = %exception.file,
            line = exception.line,
            "{}",
            exception.message
        );
    }

    fn should_report(&self, exception: &Exception) -> bool {
        !self.dont_report.contains(&exception.kind)
    }
}

/// Wraps a host handler and additionally ships qualifying errors to the
/// monitoring service.
pub struct MonitoringErrorHandler<H> {
    inner: H,
    client: Arc<MonitoringClient>,
    report_errors: bool,
    production: bool,
}

impl<H: ExceptionHandler> MonitoringErrorHandler<H> {
    pub fn new(inner: H, client: Arc<MonitoringClient>, config: &MonitorConfig) -> Self {
        Self {
            inner,
            client,
            report_errors: config.report_errors,
            production: config.is_production(),
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn should_report_to_monitoring(&self, exception: &Exception) -> bool {
        self.inner.should_report(exception) && self.report_errors && self.production
    }

    pub fn build_record(&self, exception: &Exception, context: &RequestContext) -> ErrorRecord {
        let or_unknown =
            |value: &Option<String>| value.clone().unwrap_or_else(|| UNKNOWN.to_string());
        ErrorRecord {
            timestamp: Utc::now(),
            level: exception.category.level(),
            message: exception.message.clone(),
            file: exception.file.clone(),
            line: exception.line,
            trace: exception.trace.clone(),
            user_id: context.user_id.clone(),
            ip_address: or_unknown(&context.ip_address),
            user_agent: or_unknown(&context.user_agent),
            request_url: or_unknown(&context.request_url),
            request_method: or_unknown(&context.request_method),
        }
    }

    /// Runs the host's reporting, then forwards to monitoring if the error
    /// qualifies. Returns whether a record was delivered.
    pub async fn report(&self, exception: &Exception, context: &RequestContext) -> bool {
        self.inner.report(exception);

        if !self.should_report_to_monitoring(exception) {
            return false;
        }

        let record = self.build_record(exception, context);
        let delivered = self.client.send_error(&record).await;
        if !delivered {
            warn!(kind = %exception.kind, "Failed to report error to monitoring service.");
        }
        delivered
    }
}

/// Extracts the message of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    match payload.downcast_ref::<&'static str>() {
        Some(s) => s,
        None => match payload.downcast_ref::<String>() {
            Some(s) => s.as_str(),
            None => "Box<dyn Any>",
        },
    }
}

fn exception_from_panic(info: &PanicHookInfo<'_>) -> Exception {
    let (file, line) = info
        .location()
        .map(|l| (l.file().to_string(), l.line()))
        .unwrap_or_else(|| (UNKNOWN.to_string(), 0));
    Exception {
        kind: "panic".to_string(),
        category: ErrorCategory::RuntimeFault,
        message: panic_message(info.payload()).to_string(),
        file,
        line,
        trace: Backtrace::force_capture().to_string(),
    }
}

/// Installs a panic hook that reports panics through `handler`, then
/// dispatches to the hook that was there before.
///
/// Delivery happens on the ambient tokio runtime. Panics outside a runtime
/// only reach the host's own handler.
pub fn register_panic_handler<H>(handler: Arc<MonitoringErrorHandler<H>>)
where
    H: ExceptionHandler + 'static,
{
    let next = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let exception = exception_from_panic(info);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let handler = Arc::clone(&handler);
                runtime.spawn(async move {
                    handler.report(&exception, &RequestContext::default()).await;
                });
            }
            Err(_) => {
                debug!("Panic outside of a tokio runtime, skipping monitoring report.");
                handler.inner().report(&exception);
            }
        }
        next(info);
    }));
}
