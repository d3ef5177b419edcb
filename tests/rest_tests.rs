use serde_json::json;
use tango_exporter::directory::rest::{RestChannelFactory, RestRegistry};
use tango_exporter::directory::{ChannelFactory, DeviceChannel, Registry};
use tango_exporter::error::Error;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_host_servers_lists_the_host() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hosts/host01/servers"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!(["TangoTest/1", "Starter/host01"])),
        )
        .mount(&server)
        .await;

    let registry = RestRegistry::new(&server.uri()).unwrap();
    let servers = registry.host_servers("host01").await.unwrap();

    assert_eq!(servers, vec!["TangoTest/1", "Starter/host01"]);
}

#[tokio::test]
async fn test_import_info_ignores_extra_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devices/dserver/TangoTest/1/import"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "exported": true,
            "pid": 4321,
            "ior": "IOR:0100000017",
            "version": "5"
        })))
        .mount(&server)
        .await;

    let registry = RestRegistry::new(&server.uri()).unwrap();
    let info = registry.import_info("dserver/TangoTest/1").await.unwrap();

    assert!(info.exported);
    assert_eq!(info.pid, 4321);
}

#[tokio::test]
async fn test_server_error_maps_to_registry_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hosts/host01/servers"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let registry = RestRegistry::new(&server.uri()).unwrap();
    let result = registry.host_servers("host01").await;

    assert!(matches!(result, Err(Error::RegistryUnavailable(_))));
}

#[tokio::test]
async fn test_connection_failure_maps_to_registry_unavailable() {
    // Nothing listens here.
    let registry = RestRegistry::new("127.0.0.1:9").unwrap();
    let result = registry.host_servers("host01").await;

    assert!(matches!(result, Err(Error::RegistryUnavailable(_))));
}

#[tokio::test]
async fn test_class_list_parses_pairs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/servers/Starter/host01/classes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"device": "tango/admin/host01", "class": "Starter"},
            {"device": "dserver/Starter/host01", "class": "DServer"}
        ])))
        .mount(&server)
        .await;

    let registry = RestRegistry::new(&server.uri()).unwrap();
    let classes = registry.class_list("Starter/host01").await.unwrap();

    assert_eq!(classes.len(), 2);
    assert_eq!(classes[0].device, "tango/admin/host01");
    assert_eq!(classes[0].class, "Starter");
}

#[tokio::test]
async fn test_ping_round_trips_through_the_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devices/dserver/TangoTest/1/ping"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let factory = RestChannelFactory::new(&server.uri()).unwrap();
    let channel = factory.open("dserver/TangoTest/1").unwrap();
    let rtt = channel.ping().await.unwrap();

    assert!(rtt.as_nanos() > 0);
}

#[tokio::test]
async fn test_failed_ping_is_device_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devices/dserver/TangoTest/1/ping"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let factory = RestChannelFactory::new(&server.uri()).unwrap();
    let channel = factory.open("dserver/TangoTest/1").unwrap();
    let result = channel.ping().await;

    assert!(matches!(result, Err(Error::DeviceUnreachable(_))));
}

#[tokio::test]
async fn test_read_spectrum_returns_the_lines() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devices/tango/admin/host01/attributes/Servers/value"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(["TangoTest/1\tON\t1\t3", "Dummy/1\tOFF\t1\t0"])),
        )
        .mount(&server)
        .await;

    let factory = RestChannelFactory::new(&server.uri()).unwrap();
    let channel = factory.open("tango/admin/host01").unwrap();
    let lines = channel.read_spectrum("Servers").await.unwrap();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "TangoTest/1\tON\t1\t3");
}
