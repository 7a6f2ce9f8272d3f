mod diagnostics;

use log::{error, info, warn};
use sexpr_lint::{DocumentSchema, Linter, SchemaValidator, Settings};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};

struct SexprLanguageServer {
    client: Client,
    linter: Arc<Linter<SchemaValidator>>,
    diagnostics_cache: Arc<RwLock<HashMap<Url, DocumentDiagnostics>>>,
}

/// Diagnostics of one document and the version they were computed for.
#[derive(Debug)]
struct DocumentDiagnostics {
    version: Option<i32>,
    items: Vec<Diagnostic>,
}

impl DocumentDiagnostics {
    /// Cycles finish in no fixed order; a result for an older version than
    /// the one already cached must not replace it. Unversioned results
    /// (saves) always apply.
    fn supersedes(&self, version: Option<i32>) -> bool {
        matches!((self.version, version), (Some(cached), Some(version)) if version < cached)
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for SexprLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        if let Some(options) = params.initialization_options {
            self.apply_settings(options).await;
        }

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "sexpr-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(true),
                        })),
                        ..Default::default()
                    },
                )),
                diagnostic_provider: Some(DiagnosticServerCapabilities::Options(
                    DiagnosticOptions {
                        identifier: Some(diagnostics::SOURCE.to_string()),
                        inter_file_dependencies: false,
                        workspace_diagnostics: false,
                        work_done_progress_options: WorkDoneProgressOptions::default(),
                    },
                )),
                ..ServerCapabilities::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("sexpr-lsp initialized");
        self.client
            .log_message(MessageType::INFO, "sexpr-lint server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let document = params.text_document;
        self.validate_document(document.uri, document.text, Some(document.version))
            .await;
    }

    async fn did_change(&self, mut params: DidChangeTextDocumentParams) {
        // Full sync: the last change carries the whole document.
        if let Some(change) = params.content_changes.pop() {
            let document = params.text_document;
            self.validate_document(document.uri, change.text, Some(document.version))
                .await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        if let Some(text) = params.text {
            self.validate_document(params.text_document.uri, text, None)
                .await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.diagnostics_cache.write().await.remove(&uri);
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        self.apply_settings(params.settings).await;
    }

    async fn diagnostic(
        &self,
        params: DocumentDiagnosticParams,
    ) -> Result<DocumentDiagnosticReportResult> {
        let uri = params.text_document.uri;
        let diagnostics = self
            .diagnostics_cache
            .read()
            .await
            .get(&uri)
            .map(|cached| cached.items.clone())
            .unwrap_or_default();

        Ok(DocumentDiagnosticReportResult::Report(
            DocumentDiagnosticReport::Full(RelatedFullDocumentDiagnosticReport {
                related_documents: None,
                full_document_diagnostic_report: FullDocumentDiagnosticReport {
                    result_id: None,
                    items: diagnostics,
                },
            }),
        ))
    }
}

impl SexprLanguageServer {
    fn new(client: Client) -> Self {
        Self {
            client,
            linter: Arc::new(Linter::new(SchemaValidator::new(DocumentSchema::default()))),
            diagnostics_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Applies client settings. A payload that does not deserialize leaves
    /// the current settings in place.
    async fn apply_settings(&self, value: serde_json::Value) {
        match Settings::from_json(value) {
            Ok(settings) => {
                self.linter.configure(&settings);
                let sections = settings.schema.sections.len();
                self.linter
                    .with_validator(|validator| validator.set_schema(settings.schema));
                info!("settings applied: {sections} schema sections");
            }
            Err(err) => {
                warn!("{err}; keeping previous settings");
                self.client
                    .log_message(
                        MessageType::WARNING,
                        format!("sexpr-lint: {err}; keeping previous settings"),
                    )
                    .await;
            }
        }
    }

    async fn validate_document(&self, uri: Url, text: String, version: Option<i32>) {
        let linter = Arc::clone(&self.linter);
        let document = uri.to_string();
        let rendered = tokio::task::spawn_blocking(move || {
            let findings = linter.lint(&text, &document);
            diagnostics::to_lsp_diagnostics(&findings, &text)
        })
        .await;

        let diagnostics = match rendered {
            Ok(diagnostics) => diagnostics,
            Err(err) => {
                error!("{uri}: lint task failed: {err}");
                self.client
                    .log_message(MessageType::ERROR, format!("sexpr-lint: {uri}: {err}"))
                    .await;
                Vec::new()
            }
        };

        // Cached for pull diagnostics, published for push. The cache lock is
        // held across the publish so a newer cycle cannot interleave.
        let mut cache = self.diagnostics_cache.write().await;
        if cache.get(&uri).is_some_and(|cached| cached.supersedes(version)) {
            info!("{uri}: dropping diagnostics for outdated version {version:?}");
            return;
        }
        cache.insert(
            uri.clone(),
            DocumentDiagnostics {
                version,
                items: diagnostics.clone(),
            },
        );

        self.client
            .publish_diagnostics(uri, diagnostics, version)
            .await;
    }
}

#[tokio::main]
async fn main() {
    initialize_logging();

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(SexprLanguageServer::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}

/// stdout carries the protocol, so a server only ever logs to stderr.
fn initialize_logging() {
    let is_console = atty::is(atty::Stream::Stdin) || atty::is(atty::Stream::Stdout);

    let mut builder = env_logger::Builder::from_default_env();
    builder
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stderr);
    if is_console {
        builder.format_timestamp_secs();
    } else {
        builder.format_timestamp_millis();
    }
    builder.init();

    if is_console {
        info!("sexpr-lsp running in console");
    } else {
        info!("sexpr-lsp running as language server");
    }
}
