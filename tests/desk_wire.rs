use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::net::TcpListener;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage, SimpleQueryRow};

use rota::clock::SystemClock;
use rota::days::{DayManager, DaySettings};
use rota::snapshot;
use rota::wire;

// Far enough ahead that nothing is due and the ticker stays idle.
const DAY: &str = "2099-01-01";

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server() -> (SocketAddr, Arc<DayManager>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let dir = std::env::temp_dir().join(format!("rota_int_test_{nanos}"));
    std::fs::create_dir_all(&dir).unwrap();
    let settings = DaySettings {
        tick_every: Duration::from_secs(3600),
        ..DaySettings::default()
    };
    let days = Arc::new(DayManager::new(
        dir,
        snapshot::default_catalog(),
        Arc::new(SystemClock),
        settings,
    ));

    let days2 = days.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let days = days2.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, days, "rota".to_string(), None).await;
            });
        }
    });

    (addr, days)
}

async fn connect(addr: SocketAddr, dbname: &str) -> Client {
    let mut config = Config::new();
    config
        .host(addr.ip().to_string())
        .port(addr.port())
        .dbname(dbname)
        .user("desk")
        .password("rota");

    let (client, connection) = config.connect(NoTls).await.unwrap();
    tokio::spawn(async move {
        let _ = connection.await;
    });
    client
}

async fn rows(client: &Client, sql: &str) -> Vec<SimpleQueryRow> {
    client
        .simple_query(sql)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|m| match m {
            SimpleQueryMessage::Row(row) => Some(row),
            _ => None,
        })
        .collect()
}

async fn check_in_two(client: &Client) {
    client
        .simple_query(
            "INSERT INTO technicians (name, check_in, tier) VALUES ('Iris', '2099-01-01T09:00:00Z', 'full')",
        )
        .await
        .unwrap();
    client
        .simple_query(
            "INSERT INTO technicians (name, check_in, tier) VALUES ('Pan', '2099-01-01T09:05:00Z', 'junior_basic')",
        )
        .await
        .unwrap();
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn connect_and_list_services() {
    let (addr, _days) = start_test_server().await;
    let client = connect(addr, DAY).await;

    let services = rows(&client, "SELECT * FROM services").await;
    assert!(!services.is_empty());
    assert!(
        services
            .iter()
            .any(|r| r.get("name") == Some("NSHe (45 mins)") && r.get("minutes") == Some("45"))
    );
}

#[tokio::test]
async fn walk_in_goes_to_earliest_free() {
    let (addr, _days) = start_test_server().await;
    let client = connect(addr, DAY).await;
    check_in_two(&client).await;

    let reg = rows(
        &client,
        "INSERT INTO customers (service, arrival) VALUES ('NSHe (45 mins)', '2099-01-01T09:10:00Z')",
    )
    .await;
    assert_eq!(reg.len(), 1);
    assert_eq!(reg[0].get("kind"), Some("booking"));
    assert_eq!(reg[0].get("technician"), Some("Iris"));
    assert_eq!(reg[0].get("start"), Some("2099-01-01T09:10:00+00:00"));
    assert_eq!(reg[0].get("end"), Some("2099-01-01T09:55:00+00:00"));

    // Iris is now busy until 09:55, so Pan leads the rotation
    let rotation = rows(&client, "SELECT * FROM rotation").await;
    assert_eq!(rotation[0].get("name"), Some("Pan"));
    assert_eq!(rotation[0].get("position"), Some("1"));
    assert_eq!(rotation[1].get("served_count"), Some("1"));
}

#[tokio::test]
async fn group_binds_back_to_back_on_capable_technician() {
    let (addr, _days) = start_test_server().await;
    let client = connect(addr, DAY).await;
    check_in_two(&client).await;

    // Pan's tier excludes foot work, so all three queue up behind each other on Iris
    let reg = rows(
        &client,
        "INSERT INTO customers (service, arrival, count) VALUES ('F(R) (30 mins)', '2099-01-01T09:10:00Z', 3)",
    )
    .await;
    let bound: Vec<_> = reg.iter().filter(|r| r.get("kind") == Some("booking")).collect();
    assert_eq!(bound.len(), 3);
    assert!(bound.iter().all(|r| r.get("technician") == Some("Iris")));

    let waiting = rows(&client, "SELECT * FROM waiting").await;
    assert!(waiting.is_empty());
}

#[tokio::test]
async fn walk_in_without_roster_waits() {
    let (addr, _days) = start_test_server().await;
    let client = connect(addr, DAY).await;

    let reg = rows(
        &client,
        "INSERT INTO customers (service, arrival, count) VALUES ('NS (30 mins)', '2099-01-01T09:10:00Z', 2)",
    )
    .await;
    assert_eq!(reg.len(), 1);
    assert_eq!(reg[0].get("kind"), Some("waiting"));
    assert_eq!(reg[0].get("count"), Some("2"));
    assert_eq!(reg[0].get("technician"), None);

    // Check-in flushes the backlog
    check_in_two(&client).await;
    let waiting = rows(&client, "SELECT * FROM waiting").await;
    assert!(waiting.is_empty());
    let bookings = rows(&client, "SELECT * FROM bookings").await;
    assert_eq!(bookings.len(), 2);
}

#[tokio::test]
async fn extend_over_extended_protocol() {
    let (addr, _days) = start_test_server().await;
    let client = connect(addr, DAY).await;
    check_in_two(&client).await;

    let reg = rows(
        &client,
        "INSERT INTO customers (service, arrival) VALUES ('NSHe (45 mins)', '2099-01-01T09:10:00Z')",
    )
    .await;
    let id = reg[0].get("id").unwrap().to_string();

    let extended = client
        .query(
            "INSERT INTO extensions (booking_id, minutes) VALUES ($1, $2)",
            &[&id.as_str(), &"15"],
        )
        .await
        .unwrap();
    assert_eq!(extended.len(), 1);
    let price: f64 = extended[0].get("price");
    let minutes: i64 = extended[0].get("minutes");
    let end: String = extended[0].get("end");
    assert_eq!(price, 100.0);
    assert_eq!(minutes, 60);
    assert_eq!(end, "2099-01-01T10:10:00+00:00");
}

#[tokio::test]
async fn eligible_preview_by_parameter() {
    let (addr, _days) = start_test_server().await;
    let client = connect(addr, DAY).await;
    check_in_two(&client).await;

    let eligible = client
        .query(
            "SELECT * FROM eligible WHERE service = $1 AND arrival = $2",
            &[&"NS (30 mins)", &"2099-01-01T09:30:00Z"],
        )
        .await
        .unwrap();
    let names: Vec<String> = eligible.iter().map(|r| r.get("technician")).collect();
    assert_eq!(names, vec!["Iris".to_string(), "Pan".to_string()]);

    // Juniors at the basic tier never do foot work
    let foot = rows(&client, "SELECT * FROM eligible WHERE service = 'F(R) (30 mins)'").await;
    assert_eq!(foot.len(), 1);
    assert_eq!(foot[0].get("technician"), Some("Iris"));
}

#[tokio::test]
async fn reservation_round_trip() {
    let (addr, _days) = start_test_server().await;
    let client = connect(addr, DAY).await;
    check_in_two(&client).await;

    let created = rows(
        &client,
        "INSERT INTO reservations (service, technician, start) VALUES ('NS (30 mins)', 'Iris', '2099-01-01T14:00:00Z')",
    )
    .await;
    assert_eq!(created[0].get("customer"), Some("reservation-1"));
    assert_eq!(created[0].get("status"), Some("pending"));

    // Iris leads the rotation, but 13:30-14:15 would run into her reservation
    let reg = rows(
        &client,
        "INSERT INTO customers (service, arrival) VALUES ('NSHe (45 mins)', '2099-01-01T13:30:00Z')",
    )
    .await;
    assert_eq!(reg[0].get("technician"), Some("Pan"));

    client
        .simple_query("DELETE FROM reservations WHERE id = 1")
        .await
        .unwrap();
    assert!(rows(&client, "SELECT * FROM reservations").await.is_empty());
}

#[tokio::test]
async fn payment_is_recorded_on_booking() {
    let (addr, _days) = start_test_server().await;
    let client = connect(addr, DAY).await;
    check_in_two(&client).await;

    let reg = rows(
        &client,
        "INSERT INTO customers (service, arrival) VALUES ('NS (30 mins)', '2099-01-01T09:10:00Z')",
    )
    .await;
    let id = reg[0].get("id").unwrap();
    client
        .simple_query(&format!(
            "INSERT INTO payments (booking_id, cash, eftpos) VALUES ({id}, 20, 35)"
        ))
        .await
        .unwrap();

    let bookings = rows(&client, "SELECT * FROM bookings").await;
    let paid: f64 = bookings[0].get("paid").unwrap().parse().unwrap();
    assert_eq!(paid, 55.0);
    assert_eq!(bookings[0].get("status"), Some("queued"));

    // Takings only count bookings that have started
    assert!(rows(&client, "SELECT * FROM takings").await.is_empty());
}

#[tokio::test]
async fn errors_carry_sqlstate() {
    let (addr, _days) = start_test_server().await;
    let client = connect(addr, DAY).await;

    let err = client
        .simple_query("INSERT INTO customers (service) VALUES ('Hot stones')")
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(&SqlState::from_code("P0001")));
    assert!(err.as_db_error().unwrap().message().contains("unknown service"));

    let err = client.simple_query("SELECT * FROM holds").await.unwrap_err();
    assert_eq!(err.code(), Some(&SqlState::SYNTAX_ERROR));

    let err = client.simple_query("DELETE FROM bookings WHERE id = 99").await.unwrap_err();
    assert_eq!(err.code(), Some(&SqlState::from_code("P0001")));
}

#[tokio::test]
async fn unusable_day_name_is_rejected() {
    let (addr, _days) = start_test_server().await;
    let client = connect(addr, "../..").await;

    let err = client.simple_query("SELECT * FROM services").await.unwrap_err();
    assert_eq!(err.code(), Some(&SqlState::CONNECTION_FAILURE));
}

#[tokio::test]
async fn days_are_isolated_by_database() {
    let (addr, days) = start_test_server().await;
    let monday = connect(addr, DAY).await;
    let tuesday = connect(addr, "2099-01-02").await;

    check_in_two(&monday).await;
    assert_eq!(rows(&monday, "SELECT * FROM technicians").await.len(), 2);
    assert!(rows(&tuesday, "SELECT * FROM technicians").await.is_empty());
    assert_eq!(days.loaded_days(), vec![DAY.to_string(), "2099-01-02".to_string()]);
}

#[tokio::test]
async fn listen_and_calls_are_acknowledged() {
    let (addr, _days) = start_test_server().await;
    let client = connect(addr, DAY).await;

    client.simple_query("LISTEN technician_Iris").await.unwrap();
    client.simple_query("UNLISTEN *").await.unwrap();
    let err = client.simple_query("LISTEN resource_1").await.unwrap_err();
    assert!(err.as_db_error().unwrap().message().contains("invalid channel"));

    for call in [
        "CALL flush_waiting()",
        "CALL apply_reservations()",
        "CALL refresh_status()",
        "CALL tick()",
        "CALL reset_day()",
    ] {
        client.simple_query(call).await.unwrap();
    }
}
