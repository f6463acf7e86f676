use ferry_api::{ObjectMeta, Provider, ProviderType, VmRef};
use ferry_inventory::{ClientConfig, Inventory, InventoryError, RestClient, Vm, WebInventory};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::net::SocketAddr;
use warp::http::StatusCode;
use warp::Filter;

fn vm(id: &str, name: &str) -> Vm {
    Vm {
        id: id.to_string(),
        name: name.to_string(),
        path: format!("/dc/vm/{name}"),
    }
}

/// Inventory service double:
/// - `vms/vm-1` exists, `vms/vm-loading` answers 206, anything else 404
/// - `vms?name=web` lists one VM, other names list nothing
/// - every route requires `version: 4`
fn spawn_inventory() -> SocketAddr {
    let version = warp::header::exact("version", "4");

    let get_vm = warp::path!("providers" / String / String / "vms" / String)
        .and(version)
        .map(|_type: String, _uid: String, id: String| match id.as_str() {
            "vm-1" => warp::reply::with_status(
                warp::reply::json(&vm("vm-1", "web")),
                StatusCode::OK,
            ),
            "vm-loading" => warp::reply::with_status(
                warp::reply::json(&serde_json::json!({})),
                StatusCode::PARTIAL_CONTENT,
            ),
            _ => warp::reply::with_status(
                warp::reply::json(&serde_json::json!({})),
                StatusCode::NOT_FOUND,
            ),
        });

    let list_vms = warp::path!("providers" / String / String / "vms")
        .and(version)
        .and(warp::query::<HashMap<String, String>>())
        .map(|_type: String, _uid: String, query: HashMap<String, String>| {
            let found: Vec<Vm> = match query.get("name").map(String::as_str) {
                Some("web") => vec![vm("vm-1", "web")],
                _ => Vec::new(),
            };
            warp::reply::json(&found)
        });

    let list_networks = warp::path!("providers" / String / String / "networks")
        .and(version)
        .map(|_type: String, _uid: String| {
            warp::reply::with_status(warp::reply::json(&Vec::<String>::new()), StatusCode::BAD_GATEWAY)
        });

    let (addr, server) = warp::serve(get_vm.or(list_vms).or(list_networks))
        .bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

fn provider() -> Provider {
    Provider::new(
        ObjectMeta::new("ferry", "vcenter"),
        ProviderType::VSphere,
        "https://vcenter.local/sdk",
    )
}

fn inventory(addr: SocketAddr) -> WebInventory {
    WebInventory::new(RestClient::new(ClientConfig::new(format!("http://{addr}"))))
}

#[tokio::test]
async fn find_vm_by_id() {
    let addr = spawn_inventory();
    let found = inventory(addr)
        .find_vm(&provider(), &VmRef::by_id("vm-1"))
        .await
        .unwrap();
    assert_eq!(found, vm("vm-1", "web"));
}

#[tokio::test]
async fn find_vm_by_name_takes_first_match() {
    let addr = spawn_inventory();
    let found = inventory(addr)
        .find_vm(&provider(), &VmRef::by_name("web"))
        .await
        .unwrap();
    assert_eq!(found.id, "vm-1");
}

#[tokio::test]
async fn unknown_vm_is_not_found() {
    let addr = spawn_inventory();
    let inv = inventory(addr);

    let by_id = inv.find_vm(&provider(), &VmRef::by_id("missing")).await;
    assert!(by_id.unwrap_err().is_not_found());

    let by_name = inv.find_vm(&provider(), &VmRef::by_name("db")).await;
    assert!(by_name.unwrap_err().is_not_found());
}

#[tokio::test]
async fn partial_content_is_not_ready() {
    let addr = spawn_inventory();
    let err = inventory(addr)
        .find_vm(&provider(), &VmRef::by_id("vm-loading"))
        .await
        .unwrap_err();
    assert!(err.is_not_ready());
}

#[tokio::test]
async fn list_rejects_non_ok_status() {
    let addr = spawn_inventory();
    let client = RestClient::new(ClientConfig::new(format!("http://{addr}")));
    let err = client
        .list::<Vec<String>>("providers/vsphere/x/networks", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::Status { status: 502, .. }));
}

#[tokio::test]
async fn connect_is_reused() {
    let client = RestClient::new(ClientConfig::new("http://127.0.0.1:1"));
    let first: *const reqwest::Client = client.connect().await.unwrap();
    let second: *const reqwest::Client = client.connect().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn unreachable_service_is_transport_error() {
    let client = RestClient::new(ClientConfig::new("http://127.0.0.1:1"));
    let err = client.get::<Vm>("vms/vm-1", &[]).await.unwrap_err();
    assert!(matches!(err, InventoryError::Transport(_)));
}
