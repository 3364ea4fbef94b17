#![allow(dead_code)]

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;

use alloy::primitives::Address as EthAddress;
use serde_json::Value;
use tiny_http::{Header, Response, Server, StatusCode};

use fil_custody_adapters::{InMemoryEvm, InMemoryLotus, LocalCustody};
use fil_custody_core::{Address, KeyId, Network, Orchestrator, PipelineConfig};

pub type TestOrchestrator = Orchestrator<LocalCustody, InMemoryLotus, InMemoryEvm>;

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";
pub const CAROL: &str = "carol";

pub struct Harness {
    pub orch: TestOrchestrator,
    pub custody: LocalCustody,
    pub lotus: InMemoryLotus,
    pub evm: InMemoryEvm,
}

pub fn secret(seed: u8) -> [u8; 32] {
    let mut secret = [0u8; 32];
    secret[0] = 0x42;
    secret[31] = seed;
    secret
}

pub fn harness() -> Harness {
    let config = PipelineConfig::default();
    let custody = LocalCustody::default();
    for (seed, name) in [(1u8, ALICE), (2, BOB), (3, CAROL)] {
        custody
            .insert_key(KeyId::new(name), &secret(seed))
            .expect("insert key");
    }
    let lotus = InMemoryLotus::new(config.network);
    let evm = InMemoryEvm::new(config.evm_chain_id);
    Harness {
        orch: Orchestrator::new(custody.clone(), lotus.clone(), evm.clone(), config),
        custody,
        lotus,
        evm,
    }
}

impl Harness {
    pub async fn native_address(&self, name: &str) -> Address {
        self.orch
            .signer
            .native_address(&KeyId::new(name), Network::Testnet)
            .await
            .expect("native address")
    }

    pub async fn evm_address(&self, name: &str) -> EthAddress {
        self.orch
            .signer
            .evm_address(&KeyId::new(name))
            .await
            .expect("evm address")
    }
}

pub fn key(name: &str) -> KeyId {
    KeyId::new(name)
}

pub fn wallet_address() -> EthAddress {
    "0x00000000000000000000000000000000000057a1"
        .parse()
        .expect("wallet address")
}

/// Serves canned JSON bodies keyed by the JSON-RPC `method` (or the
/// `X-Amz-Target` header) and records every request body.
pub fn spawn_mock_server(
    routes: Vec<(&'static str, u16, Value)>,
    requests: Arc<Mutex<Vec<Value>>>,
) -> (String, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").expect("start server");
    let addr = format!("http://{}", server.server_addr());

    let join = thread::spawn(move || {
        for _ in 0..16 {
            let mut req = match server.recv() {
                Ok(r) => r,
                Err(_) => break,
            };
            let mut body = String::new();
            let _ = req.as_reader().read_to_string(&mut body);
            let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let target = req
                .headers()
                .iter()
                .find(|h| h.field.equiv("X-Amz-Target"))
                .map(|h| h.value.as_str().to_owned());
            let route_key = target.clone().unwrap_or_else(|| {
                parsed
                    .get("method")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned()
            });
            let mut recorded = parsed.clone();
            if let Value::Object(map) = &mut recorded {
                map.insert("_route".to_owned(), Value::String(route_key.clone()));
                let auth = req
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| Value::String(h.value.as_str().to_owned()))
                    .unwrap_or(Value::Null);
                map.insert("_authorization".to_owned(), auth);
            }
            if let Ok(mut g) = requests.lock() {
                g.push(recorded);
            }

            let (code, payload) = routes
                .iter()
                .find(|(route, _, _)| *route == route_key)
                .map(|(_, code, payload)| (*code, payload.clone()))
                .unwrap_or((404, serde_json::json!({"error": "not found"})));
            let content_type = if target.is_some() {
                "application/x-amz-json-1.1"
            } else {
                "application/json"
            };
            let header = Header::from_bytes("Content-Type", content_type).expect("header");
            let response = Response::from_string(payload.to_string())
                .with_status_code(StatusCode(code))
                .with_header(header);
            let _ = req.respond(response);
        }
    });

    (addr, join)
}

pub fn rpc_result(result: Value) -> Value {
    serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": result})
}
