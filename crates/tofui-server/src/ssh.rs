use anyhow::{anyhow, Context};
use async_trait::async_trait;
use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::{Backend, ClearType as BackendClearType, CrosstermBackend, WindowSize};
use ratatui::buffer::Cell;
use ratatui::layout::{Rect, Size};
use ratatui::Terminal;
use russh::server::{self, Auth, Handle, Msg, Server as _, Session};
use russh::{Channel, ChannelId, CryptoVec, MethodSet, Pty};
use russh_keys::key::{KeyPair, PublicKey};
use russh_keys::PublicKeyBase64;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tofui_core::SessionIdentity;
use tofui_ui::Event;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::host::{self, HostContext, OpenSession};
use crate::input::decode_keys;

const DEFAULT_PTY_SIZE: Rect = Rect {
    x: 0,
    y: 0,
    width: 80,
    height: 24,
};

/// Loads the server's host key, generating and saving one on first start.
pub fn load_or_create_host_key(path: &Path) -> anyhow::Result<KeyPair> {
    if path.exists() {
        return russh_keys::load_secret_key(path, None)
            .with_context(|| format!("loading host key {}", path.display()));
    }
    let key = KeyPair::generate_ed25519().ok_or_else(|| anyhow!("failed to generate host key"))?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating host key dir {}", dir.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating host key {}", path.display()))?;
    russh_keys::encode_pkcs8_pem(&key, file)
        .with_context(|| format!("writing host key {}", path.display()))?;
    info!(event = "ssh_host_key_generated", path = %path.display());
    Ok(key)
}

pub async fn serve(ctx: HostContext, host_key: KeyPair, host: &str, port: u16) -> anyhow::Result<()> {
    let config = Arc::new(server::Config {
        inactivity_timeout: Some(Duration::from_secs(3600)),
        auth_rejection_time: Duration::from_secs(1),
        auth_rejection_time_initial: Some(Duration::from_secs(0)),
        methods: MethodSet::PUBLICKEY,
        keys: vec![host_key],
        ..Default::default()
    });
    info!(event = "ssh_server_start", host = %host, port);
    let mut server = SshServer { ctx };
    server
        .run_on_address(config, (host, port))
        .await
        .with_context(|| format!("ssh server on {host}:{port}"))
}

struct SshServer {
    ctx: HostContext,
}

impl server::Server for SshServer {
    type Handler = SshConnection;

    fn new_client(&mut self, peer: Option<SocketAddr>) -> SshConnection {
        debug!(event = "ssh_client_connected", peer = ?peer);
        SshConnection::new(self.ctx.clone(), peer)
    }
}

/// One SSH connection. It hosts at most one interactive session.
struct SshConnection {
    ctx: HostContext,
    peer: Option<SocketAddr>,
    identity: Option<SessionIdentity>,
    channel: Option<ChannelId>,
    size: watch::Sender<Rect>,
    events: Option<mpsc::Sender<Event>>,
}

impl SshConnection {
    fn new(ctx: HostContext, peer: Option<SocketAddr>) -> Self {
        let (size, _) = watch::channel(DEFAULT_PTY_SIZE);
        Self {
            ctx,
            peer,
            identity: None,
            channel: None,
            size,
            events: None,
        }
    }

    async fn post(&self, event: Event) {
        if let Some(events) = &self.events {
            let _ = events.send(event).await;
        }
    }

    fn set_size(&self, width: u32, height: u32) -> Rect {
        let area = Rect::new(0, 0, clamp(width), clamp(height));
        self.size.send_replace(area);
        area
    }
}

fn clamp(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX).max(1)
}

impl Drop for SshConnection {
    fn drop(&mut self) {
        if let Some(events) = &self.events {
            let _ = events.try_send(Event::Quit);
        }
    }
}

#[async_trait]
impl server::Handler for SshConnection {
    type Error = anyhow::Error;

    async fn auth_publickey(&mut self, user: &str, public_key: &PublicKey) -> Result<Auth, Self::Error> {
        let identity = SessionIdentity::from_public_key(&public_key.public_key_bytes());
        info!(
            event = "ssh_auth_accepted",
            user = %user,
            identity = identity.short(),
            peer = ?self.peer
        );
        self.identity = Some(identity);
        Ok(Auth::Accept)
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        if self.channel.is_some() {
            debug!(event = "ssh_extra_channel_rejected", peer = ?self.peer);
            return Ok(false);
        }
        self.channel = Some(channel.id());
        Ok(true)
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let area = self.set_size(col_width, row_height);
        self.post(Event::Resize {
            width: area.width,
            height: area.height,
        })
        .await;
        session.channel_success(channel);
        Ok(())
    }

    async fn shell_request(&mut self, channel: ChannelId, session: &mut Session) -> Result<(), Self::Error> {
        if self.events.is_some() {
            session.channel_failure(channel);
            return Ok(());
        }
        let identity = self
            .identity
            .clone()
            .ok_or_else(|| anyhow!("shell requested before authentication"))?;
        let opened = self.ctx.open_session(identity).await;
        self.events = Some(opened.sender.clone());
        tokio::spawn(run_channel_session(
            opened,
            session.handle(),
            channel,
            self.size.subscribe(),
        ));
        session.channel_success(channel);
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        _channel: ChannelId,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        let area = self.set_size(col_width, row_height);
        self.post(Event::Resize {
            width: area.width,
            height: area.height,
        })
        .await;
        Ok(())
    }

    async fn data(&mut self, _channel: ChannelId, data: &[u8], _session: &mut Session) -> Result<(), Self::Error> {
        for key in decode_keys(data) {
            self.post(Event::Key(key)).await;
        }
        Ok(())
    }

    async fn channel_eof(&mut self, _channel: ChannelId, _session: &mut Session) -> Result<(), Self::Error> {
        self.post(Event::Quit).await;
        Ok(())
    }

    async fn channel_close(&mut self, _channel: ChannelId, _session: &mut Session) -> Result<(), Self::Error> {
        self.post(Event::Quit).await;
        Ok(())
    }
}

async fn run_channel_session(
    opened: OpenSession,
    handle: Handle,
    channel: ChannelId,
    size: watch::Receiver<Rect>,
) {
    let identity = opened.registration.identity().clone();
    let (output, mut pending) = mpsc::unbounded_channel::<Vec<u8>>();
    let forward = {
        let handle = handle.clone();
        tokio::spawn(async move {
            while let Some(bytes) = pending.recv().await {
                if handle.data(channel, CryptoVec::from(bytes)).await.is_err() {
                    break;
                }
            }
        })
    };

    if let Err(err) = draw_on_channel(opened, output, size).await {
        warn!(
            event = "ssh_session_error",
            identity = identity.short(),
            error = %err
        );
    }
    let _ = forward.await;
    let _ = handle.eof(channel).await;
    let _ = handle.close(channel).await;
    debug!(event = "ssh_channel_closed", identity = identity.short());
}

async fn draw_on_channel(
    opened: OpenSession,
    output: mpsc::UnboundedSender<Vec<u8>>,
    size: watch::Receiver<Rect>,
) -> anyhow::Result<()> {
    let mut control = ChannelWriter::new(output.clone());
    execute!(control, EnterAlternateScreen, Hide, Clear(ClearType::All))?;

    let mut terminal = Terminal::new(SessionBackend::new(ChannelWriter::new(output), size))?;
    let result = host::run_session(opened, &mut terminal).await;

    execute!(control, Clear(ClearType::All), Show, LeaveAlternateScreen)?;
    result?;
    Ok(())
}

/// Buffers terminal output and hands it to the channel on flush.
struct ChannelWriter {
    buffer: Vec<u8>,
    output: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelWriter {
    fn new(output: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            buffer: Vec::new(),
            output,
        }
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.output
            .send(std::mem::take(&mut self.buffer))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "ssh channel closed"))
    }
}

/// Crossterm output with the size reported by the client's pty instead of
/// the host's own terminal.
struct SessionBackend {
    inner: CrosstermBackend<ChannelWriter>,
    size: watch::Receiver<Rect>,
}

impl SessionBackend {
    fn new(writer: ChannelWriter, size: watch::Receiver<Rect>) -> Self {
        Self {
            inner: CrosstermBackend::new(writer),
            size,
        }
    }
}

impl Backend for SessionBackend {
    fn draw<'a, I>(&mut self, content: I) -> io::Result<()>
    where
        I: Iterator<Item = (u16, u16, &'a Cell)>,
    {
        self.inner.draw(content)
    }

    fn hide_cursor(&mut self) -> io::Result<()> {
        self.inner.hide_cursor()
    }

    fn show_cursor(&mut self) -> io::Result<()> {
        self.inner.show_cursor()
    }

    fn get_cursor(&mut self) -> io::Result<(u16, u16)> {
        Ok((0, 0))
    }

    fn set_cursor(&mut self, x: u16, y: u16) -> io::Result<()> {
        self.inner.set_cursor(x, y)
    }

    fn clear(&mut self) -> io::Result<()> {
        self.inner.clear()
    }

    fn clear_region(&mut self, clear_type: BackendClearType) -> io::Result<()> {
        self.inner.clear_region(clear_type)
    }

    fn size(&self) -> io::Result<Rect> {
        Ok(*self.size.borrow())
    }

    fn window_size(&mut self) -> io::Result<WindowSize> {
        let area = *self.size.borrow();
        Ok(WindowSize {
            columns_rows: Size {
                width: area.width,
                height: area.height,
            },
            pixels: Size {
                width: 0,
                height: 0,
            },
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        Backend::flush(&mut self.inner)
    }
}
