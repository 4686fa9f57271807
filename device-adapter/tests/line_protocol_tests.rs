//! Contract tests against a small line-based AVR protocol served over loopback.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use device_adapter::probe::tcp_probe;
use device_adapter::{
    event_channel, AdapterError, AdapterFactory, CancellationToken, DeviceAdapter, EventSink,
    OutOfOrderFilter, Result,
};
use device_model::{Command, DeviceRegistry, Feedback, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

/// Replies to every line with the power state; `PWON`/`PWSTANDBY` change it first
async fn serve_avr(listener: TcpListener) {
    let mut power = "PWSTANDBY".to_string();
    while let Ok((stream, _)) = listener.accept().await {
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line == "PWON" || line == "PWSTANDBY" {
                power = line;
            }
            if write.write_all(format!("{power}\r\n").as_bytes()).await.is_err() {
                break;
            }
        }
    }
}

struct Session {
    lines: tokio::io::Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

struct LineAvr {
    addr: SocketAddr,
    registry: DeviceRegistry,
    sink: EventSink,
    session: Option<Session>,
    dead: bool,
    keys: OutOfOrderFilter,
}

impl LineAvr {
    async fn session(&mut self) -> Result<&mut Session> {
        if self.session.is_none() {
            tcp_probe("Avr", self.addr, Duration::from_millis(500)).await?;
            let stream = TcpStream::connect(self.addr).await?;
            let (read, write) = stream.into_split();
            self.session = Some(Session {
                lines: BufReader::new(read).lines(),
                write,
            });
        }
        self.session
            .as_mut()
            .ok_or_else(|| AdapterError::Connection("no session".to_string()))
    }

    async fn send(&mut self, payload: &str) -> Result<()> {
        let result = self.exchange(payload).await;
        if let Err(e) = &result {
            if e.is_connection_error() {
                self.session = None;
                self.dead = true;
            }
        }
        result
    }

    async fn exchange(&mut self, payload: &str) -> Result<()> {
        let session = self.session().await?;
        session
            .write
            .write_all(format!("{payload}\r\n").as_bytes())
            .await?;

        let reply = tokio::time::timeout(Duration::from_secs(1), session.lines.next_line())
            .await
            .map_err(|_| AdapterError::DeviceProtocolError("no reply".to_string()))??
            .ok_or_else(|| AdapterError::Connection("closed by device".to_string()))?;

        let on = reply.trim_end_matches('\r') == "PWON";
        self.sink
            .update_feedback(&self.registry, "Zone1Power", Value::Bool(on))
    }
}

#[async_trait]
impl DeviceAdapter for LineAvr {
    fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn invalid_state(&self) -> bool {
        self.dead
    }

    async fn execute_command(&mut self, command: &Command, _cancel: &CancellationToken) -> Result<()> {
        if self.keys.should_ignore(command.id()) {
            return Ok(());
        }
        match command.payload() {
            Some(payload) => self.send(payload).await,
            None => Ok(()),
        }
    }

    async fn refresh(&mut self, _cancel: &CancellationToken) -> Result<()> {
        self.send("PW?").await
    }

    async fn dispose(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            session.write.shutdown().await?;
        }
        Ok(())
    }
}

fn line_avr(addr: SocketAddr) -> impl AdapterFactory {
    move |sink: EventSink| -> Result<Box<dyn DeviceAdapter>> {
        let mut registry = DeviceRegistry::new();
        registry
            .command(Command::new("Zone1PowerOn").with_payload("PWON"))?
            .command(Command::new("Zone1PowerOff").with_payload("PWSTANDBY"))?
            .command(Command::new("VolumeUpPress").with_payload("MVUP"))?
            .command(Command::new("VolumeUpRelease"))?
            .feedback(Feedback::bool("Zone1Power"))?;
        Ok(Box::new(LineAvr {
            addr,
            registry,
            sink,
            session: None,
            dead: false,
            keys: OutOfOrderFilter::new().with_pair("VolumeUpPress", "VolumeUpRelease"),
        }))
    }
}

async fn spawn_avr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_avr(listener));
    addr
}

#[tokio::test]
async fn test_commands_raise_feedback_in_order() {
    let addr = spawn_avr().await;
    let (sink, mut receivers) = event_channel();
    let mut adapter = line_avr(addr).create(sink.clone()).unwrap();
    let cancel = CancellationToken::new();

    adapter.refresh(&cancel).await.unwrap();
    let on = adapter.registry().get_command("Zone1PowerOn").unwrap().clone();
    adapter.execute_command(&on, &cancel).await.unwrap();

    assert!(adapter.is_connected());
    let first = receivers.feedback.recv().await.unwrap();
    let second = receivers.feedback.recv().await.unwrap();
    assert_eq!(first.value(), &Value::Bool(false));
    assert_eq!(second.value(), &Value::Bool(true));
    assert_eq!(sink.raised_feedback_count(), 2);

    adapter.dispose().await.unwrap();
    assert!(!adapter.is_connected());
}

#[tokio::test]
async fn test_stray_key_down_is_not_sent() {
    let addr = spawn_avr().await;
    let (sink, _receivers) = event_channel();
    let mut adapter = line_avr(addr).create(sink).unwrap();
    let cancel = CancellationToken::new();

    let release = adapter.registry().get_command("VolumeUpRelease").unwrap().clone();
    let press = adapter.registry().get_command("VolumeUpPress").unwrap().clone();
    adapter.execute_command(&release, &cancel).await.unwrap();
    adapter.execute_command(&press, &cancel).await.unwrap();

    // The suppressed press never opened a session
    assert!(!adapter.is_connected());
}

#[tokio::test]
async fn test_unreachable_device_invalidates_adapter() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let (sink, _receivers) = event_channel();
    let mut adapter = line_avr(addr).create(sink).unwrap();

    let err = adapter.refresh(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, AdapterError::DevicePoweredOff { .. }));
    assert!(adapter.invalid_state());
    assert!(!adapter.is_connected());
}
