//! `did:web` documents served over HTTP.

use serde_json::Value;
use vercre_ssi::config::DidConfig;
use vercre_ssi::credential::CredentialBuilder;
use vercre_ssi::did::{DidMethod, DidOptions, DidService, Document};
use vercre_ssi::error::Err;
use vercre_ssi::key::{Key, KeyService};
use vercre_ssi::proof::{CredentialService, DocumentLoader, ProofConfig};
use vercre_ssi::provider::{HttpClient, LedgerClient, ReqwestClient};
use vercre_ssi::{tracerr, Result};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// The mock server only speaks plain HTTP.
#[derive(Clone)]
struct Rewrite(ReqwestClient);

impl HttpClient for Rewrite {
    async fn get(&self, url: &str) -> Result<Value> {
        self.0.get(&url.replacen("https://", "http://", 1)).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        self.0.post_json(&url.replacen("https://", "http://", 1), body).await
    }
}

#[derive(Clone)]
struct NoLedger;

impl LedgerClient for NoLedger {
    async fn create(&self, method: DidMethod, _: &Key, _: &DidOptions) -> Result<Document> {
        tracerr!(Err::UnsupportedOperationKind, "no ledger for did:{method}")
    }

    async fn register(&self, document: &Document) -> Result<()> {
        tracerr!(Err::RegistrationFailed, "no ledger for {}", document.id)
    }

    async fn resolve(&self, did: &str) -> Result<Document> {
        tracerr!(Err::ResolutionFailed, "no ledger for {did}")
    }
}

fn service() -> CredentialService<Rewrite, NoLedger> {
    let http = Rewrite(ReqwestClient::new().expect("should build client"));
    let dids = DidService::new(KeyService::in_memory(), http.clone(), NoLedger, DidConfig::default());
    CredentialService::new(dids, DocumentLoader::new(http, false))
}

async fn host(server: &MockServer, issuer: &CredentialService<Rewrite, NoLedger>, route: &str, did: &str) {
    let document = issuer.dids().resolve(did).await.expect("should resolve locally").into_document();
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(&document))
        .mount(server)
        .await;
}

#[tokio::test]
async fn well_known() {
    let server = MockServer::start().await;
    let issuer = service();
    let options = DidOptions::Web {
        domain: Some(server.address().to_string()),
        path: None,
    };
    let did = issuer.dids().create(DidMethod::Web, None, Some(options)).await.expect("should create");
    assert_eq!(did, format!("did:web:127.0.0.1%3A{}", server.address().port()));
    host(&server, &issuer, "/.well-known/did.json", &did).await;

    let vc = CredentialBuilder::new().issuer(&did).subject("did:example:subject").build();
    let signed = issuer
        .sign(&vc.to_json().expect("should serialize"), &ProofConfig::new(&did))
        .await
        .expect("should sign");

    let verifier = service();
    let resolved = verifier.dids().resolve(&did).await.expect("should resolve").into_document();
    assert_eq!(resolved.id, did);
    assert!(verifier.verify(&signed).await.expect("should verify").verified);
}

#[tokio::test]
async fn with_path() {
    let server = MockServer::start().await;
    let issuer = service();
    let options = DidOptions::Web {
        domain: Some(server.address().to_string()),
        path: Some("user:alice".to_string()),
    };
    let did = issuer.dids().create(DidMethod::Web, None, Some(options)).await.expect("should create");
    assert!(did.ends_with(":user:alice"));
    host(&server, &issuer, "/user/alice/did.json", &did).await;

    let verifier = service();
    assert!(verifier.dids().import_keys(&did).await.expect("should import"));
    assert!(verifier.dids().keys().has_key(&did).expect("should look up"));
}

#[tokio::test]
async fn not_hosted() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

    let did = format!("did:web:127.0.0.1%3A{}", server.address().port());
    let err = service().dids().resolve(&did).await.expect_err("should fail");
    assert!(err.is(Err::ResolutionFailed));
}
