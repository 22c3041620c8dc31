use integration_test::{closed_port, localhost, MockChain, TestProxy};
use rpc_mm::{
    JsonRpcError, JsonRpcResponse, RpcError, APPLICATION_ERROR, BACKEND_UNAVAILABLE_MESSAGE,
    INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR,
};
use serde_json::{json, Value};

const AUX_HASH: &str = "9b8a7c6d5e4f30211203f4e5d6c7b8a99a8b7c6d5e4f30211203f4e5d6c7b8a9";
const SOLVED: &str = "0000000120c8222d0497a7ab44a1a2c7bf39de941c9970b1dc72cdde0000000000000000";

fn commitment() -> String {
    format!("{AUX_HASH}0100000000000000")
}

/// Target 0x0f00..00 hex encoded little-endian: lexically small, numerically easy.
fn easy_target() -> String {
    format!("{}0f", "00".repeat(31))
}

/// Target 0x00ff..ff: lexically large, numerically harder than [`easy_target`].
fn hard_target() -> String {
    format!("{}00", "ff".repeat(31))
}

fn aux_block(target: &str) -> Value {
    json!({"hash": AUX_HASH, "target": target, "chainid": 98})
}

fn parent_work(target: &str) -> Value {
    json!({
        "data": "00000001d2a5bb8a0f4f6a7b",
        "target": target,
        "midstate": "e772fc6964ea3",
        "hash1": "00000000000000000000000000000000"
    })
}

fn proof() -> Value {
    json!({"aux": commitment(), "auxpow": "01000000010000000000"})
}

#[tokio::test]
async fn template_commits_to_aux_block() {
    let aux = MockChain::start(vec![("getauxblock", Ok(aux_block(&hard_target())))]).await;
    let parent = MockChain::start(vec![("getworkaux", Ok(parent_work(&easy_target())))]).await;
    let proxy = TestProxy::start(parent.url(), aux.url()).await;

    let template = proxy.getwork(vec![]).await.unwrap();
    assert_eq!(template["target"], json!(hard_target()));
    assert_eq!(template["data"], json!("00000001d2a5bb8a0f4f6a7b"));
    assert_eq!(template["midstate"], json!("e772fc6964ea3"));

    assert_eq!(aux.calls(), vec![("getauxblock".to_string(), vec![])]);
    assert_eq!(
        parent.calls(),
        vec![("getworkaux".to_string(), vec![json!(commitment())])]
    );
    assert!(proxy.reporter.lines().is_empty());
}

#[tokio::test]
async fn template_keeps_harder_parent_target() {
    let aux = MockChain::start(vec![("getauxblock", Ok(aux_block(&easy_target())))]).await;
    let parent = MockChain::start(vec![("getworkaux", Ok(parent_work(&hard_target())))]).await;
    let proxy = TestProxy::start(parent.url(), aux.url()).await;

    let template = proxy.getwork(vec![Value::Null]).await.unwrap();
    assert_eq!(template["target"], json!(hard_target()));
}

#[tokio::test]
async fn share_rejected_by_parent_check() {
    let aux = MockChain::start(vec![]).await;
    let parent = MockChain::start(vec![("getworkaux", Ok(json!(false)))]).await;
    let proxy = TestProxy::start(parent.url(), aux.url()).await;

    let accepted = proxy.getwork(vec![json!(SOLVED)]).await.unwrap();
    assert_eq!(accepted, json!(false));

    assert!(aux.calls().is_empty());
    assert_eq!(
        parent.calls(),
        vec![(
            "getworkaux".to_string(),
            vec![json!(""), json!(SOLVED), json!(0)]
        )]
    );
    let lines = proxy.reporter.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with(",solve,0,0"));
}

#[tokio::test]
async fn share_relayed_to_both_chains() {
    let aux = MockChain::start(vec![("getauxblock", Ok(json!(true)))]).await;
    let parent = MockChain::start(vec![
        ("getworkaux", Ok(proof())),
        ("getworkaux", Ok(json!(false))),
    ])
    .await;
    let proxy = TestProxy::start(parent.url(), aux.url()).await;

    let accepted = proxy.getwork(vec![json!(SOLVED)]).await.unwrap();
    assert_eq!(accepted, json!(true));

    assert_eq!(
        aux.calls(),
        vec![("getauxblock".to_string(), vec![json!(AUX_HASH), proof()])]
    );
    assert_eq!(
        parent.calls(),
        vec![
            (
                "getworkaux".to_string(),
                vec![json!(""), json!(SOLVED), json!(0)]
            ),
            ("getworkaux".to_string(), vec![json!(""), json!(SOLVED)]),
        ]
    );
    let lines = proxy.reporter.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with(",solve,0,1"));
}

#[tokio::test]
async fn upstream_error_reaches_worker() {
    let upstream = JsonRpcError::new(-8, "aux block hash unknown").with_data("stale");
    let aux = MockChain::start(vec![("getauxblock", Err(upstream.clone()))]).await;
    let parent = MockChain::start(vec![("getworkaux", Ok(proof()))]).await;
    let proxy = TestProxy::start(parent.url(), aux.url()).await;

    let error = proxy.getwork(vec![json!(SOLVED)]).await.unwrap_err();
    assert!(matches!(error, RpcError::JsonRpc(ref e) if *e == upstream));
    assert_eq!(parent.calls().len(), 1);
    assert!(proxy.reporter.lines().is_empty());
}

#[tokio::test]
async fn unreachable_parent_is_reported() {
    let aux = MockChain::start(vec![("getauxblock", Ok(aux_block(&hard_target())))]).await;
    let parent_url = format!("http://rpcuser:rpcpass@{}/", localhost(closed_port()));
    let proxy = TestProxy::start(parent_url, aux.url()).await;

    let error = proxy.getwork(vec![]).await.unwrap_err();
    let RpcError::JsonRpc(error) = error else {
        panic!("expected a JSON-RPC error, got {error:?}");
    };
    assert_eq!(error.code, APPLICATION_ERROR);
    assert_eq!(error.message, BACKEND_UNAVAILABLE_MESSAGE);
    assert_eq!(error.data, "127.0.0.1");
}

#[tokio::test]
async fn unreachable_aux_is_reported() {
    let aux_url = format!("http://rpcuser:rpcpass@{}/", localhost(closed_port()));
    let parent = MockChain::start(vec![("getworkaux", Ok(proof()))]).await;
    let proxy = TestProxy::start(parent.url(), aux_url).await;

    for params in [vec![], vec![json!(SOLVED)]] {
        let error = proxy.getwork(params).await.unwrap_err();
        let RpcError::JsonRpc(error) = error else {
            panic!("expected a JSON-RPC error, got {error:?}");
        };
        assert_eq!(error.code, APPLICATION_ERROR);
        assert_eq!(error.message, BACKEND_UNAVAILABLE_MESSAGE);
        assert_eq!(error.data, "127.0.0.1");
    }

    // Only the submission's candidate check reached the parent.
    assert_eq!(
        parent.calls(),
        vec![(
            "getworkaux".to_string(),
            vec![json!(""), json!(SOLVED), json!(0)]
        )]
    );
    assert!(proxy.reporter.lines().is_empty());
}

#[tokio::test]
async fn malformed_requests() {
    let aux = MockChain::start(vec![]).await;
    let parent = MockChain::start(vec![]).await;
    let proxy = TestProxy::start(parent.url(), aux.url()).await;

    let (status, body) = proxy.post_raw("{\"method\": \"getwork\"").await;
    assert_eq!(status, 200);
    let response: JsonRpcResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(response.id, Value::Null);
    assert_eq!(response.error.unwrap().code, PARSE_ERROR);

    let (_, body) = proxy
        .post_raw(r#"{"jsonrpc":"2.0","method":"getblock","params":[],"id":7}"#)
        .await;
    let response: JsonRpcResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(response.id, json!(7));
    assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);

    let (status, body) = proxy
        .post_raw(r#"{"jsonrpc":"2.0","method":"getblock","params":[]}"#)
        .await;
    assert_eq!(status, 204);
    assert!(body.is_empty());

    let error = proxy
        .getwork(vec![json!(SOLVED), json!(1)])
        .await
        .unwrap_err();
    assert!(matches!(error, RpcError::JsonRpc(ref e) if e.code == INVALID_PARAMS));

    assert!(aux.calls().is_empty());
    assert!(parent.calls().is_empty());
}
