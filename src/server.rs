use crate::protocol::{Message, MessageType};
use crate::registry::{ClientLink, UserRegistry};
use crate::store::FileStore;
use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

const OUTBOUND_CAPACITY: usize = 100;

pub struct Server {
    listener: TcpListener,
    store: Arc<Mutex<FileStore>>,
    registry: Arc<UserRegistry>,
}

impl Server {
    pub async fn bind(addr: &str, files_dir: impl Into<PathBuf>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let store = FileStore::new(files_dir)?;
        Ok(Server {
            listener,
            store: Arc::new(Mutex::new(store)),
            registry: Arc::new(UserRegistry::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Accept failures are fatal to the whole server;
    /// everything inside one session stays inside that session.
    pub async fn run(self) -> Result<()> {
        log::info!("server listening on {}", self.listener.local_addr()?);

        loop {
            let (socket, addr) = self.listener.accept().await?;
            let conn_id = Uuid::new_v4();
            log::info!("new connection {} from {}", conn_id, addr);

            let store = Arc::clone(&self.store);
            let registry = Arc::clone(&self.registry);

            tokio::spawn(async move {
                if let Err(e) = handle_client(socket, conn_id, store, registry).await {
                    log::warn!("session {} ended with error: {}", conn_id, e);
                }
            });
        }
    }
}

async fn handle_client(
    socket: TcpStream,
    conn_id: Uuid,
    store: Arc<Mutex<FileStore>>,
    registry: Arc<UserRegistry>,
) -> Result<()> {
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);

    // Writer task owns the outbound stream: replies and broadcasts from
    // any task funnel through the channel, one line at a time, flushed
    // immediately.
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            let result = async {
                write_half.write_all(line.as_bytes()).await?;
                write_half.write_all(b"\n").await?;
                write_half.flush().await
            }
            .await;
            if let Err(e) = result {
                log::warn!("write to {} failed: {}", conn_id, e);
                break;
            }
        }
    });

    let mut session = Session {
        conn_id,
        username: None,
        logged_in: false,
        tx,
        store,
        registry: Arc::clone(&registry),
    };

    let mut line = String::new();
    let outcome = loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                log::info!(
                    "connection {} ({}) closed",
                    conn_id,
                    session.username.as_deref().unwrap_or("anonymous")
                );
                break Ok(());
            }
            Ok(_) => {
                let raw = line.trim_end_matches(['\r', '\n']);
                log::debug!("{} <- {}", conn_id, raw);
                if session.handle_line(raw).await.is_err() {
                    // Outbound side is gone; nothing left to answer.
                    break Ok(());
                }
            }
            Err(e) => break Err(e.into()),
        }
    };

    // Runs on every exit path, logged in or not.
    registry.unregister(conn_id).await;
    outcome
}

struct Session {
    conn_id: Uuid,
    username: Option<String>,
    logged_in: bool,
    tx: mpsc::Sender<String>,
    store: Arc<Mutex<FileStore>>,
    registry: Arc<UserRegistry>,
}

impl Session {
    async fn handle_line(&mut self, raw: &str) -> Result<()> {
        let message = Message::decode(raw);

        if !message.is_valid() {
            return self
                .send(&Message::error("INVALID_MESSAGE", "Geçersiz mesaj formatı"))
                .await;
        }

        if message.msg_type().requires_auth() && !self.logged_in {
            return self
                .send(&Message::error("NOT_LOGGED_IN", "Önce giriş yapmanız gerekir"))
                .await;
        }

        match message.msg_type() {
            MessageType::Login => self.handle_login(message.parameter1()).await,
            MessageType::ListFilesRequest => self.push_file_list().await,
            MessageType::OpenFileRequest => self.handle_open_file(message.parameter1()).await,
            MessageType::Edit => {
                self.handle_edit(message.parameter1(), message.parameter2())
                    .await
            }
            MessageType::CreateFile => self.handle_create_file(message.parameter1()).await,
            MessageType::SaveFile => {
                self.handle_save_file(message.parameter1(), message.parameter2())
                    .await
            }
            other => {
                self.send(&Message::error(
                    "UNKNOWN_COMMAND",
                    &format!("Bilinmeyen komut: {}", other.command()),
                ))
                .await
            }
        }
    }

    async fn handle_login(&mut self, requested: &str) -> Result<()> {
        if self.logged_in {
            return self
                .send(&Message::error("ALREADY_LOGGED_IN", "Zaten giriş yapılmış"))
                .await;
        }

        if requested.trim().is_empty() {
            return self
                .send(&Message::error("INVALID_USERNAME", "Geçersiz kullanıcı adı"))
                .await;
        }

        let link = ClientLink {
            conn_id: self.conn_id,
            tx: self.tx.clone(),
        };
        if self.registry.register(requested, link).await {
            self.username = Some(requested.to_string());
            self.logged_in = true;
            log::info!("connection {} logged in as {}", self.conn_id, requested);

            self.send(&Message::success("Giriş başarılı")).await?;
            // New client gets the current listing right away.
            self.push_file_list().await
        } else {
            self.send(&Message::error(
                "USERNAME_TAKEN",
                "Bu kullanıcı adı zaten kullanılıyor",
            ))
            .await
        }
    }

    async fn push_file_list(&self) -> Result<()> {
        let files = self.store.lock().await.list();
        self.send(&Message::list_files_response(&files.join(",")))
            .await
    }

    async fn handle_open_file(&self, file_name: &str) -> Result<()> {
        let content = self.store.lock().await.read(file_name);
        match content {
            Ok(content) => {
                self.send(&Message::open_file_response(file_name, &content))
                    .await
            }
            Err(e) => self.send(&Message::error("FILE_ERROR", &e.to_string())).await,
        }
    }

    async fn handle_edit(&self, file_name: &str, content: &str) -> Result<()> {
        let written = self.store.lock().await.write(file_name, content);
        match written {
            Ok(()) => {
                // Everyone else sees the new document; the editor already
                // has it and gets no echo.
                self.registry
                    .broadcast_to_others(&Message::edit(file_name, content), self.conn_id)
                    .await;
                Ok(())
            }
            Err(e) => self.send(&Message::error("SAVE_ERROR", &e.to_string())).await,
        }
    }

    async fn handle_create_file(&self, file_name: &str) -> Result<()> {
        let created = self.store.lock().await.create(file_name);
        if created {
            self.send(&Message::success(&format!("Dosya oluşturuldu: {}", file_name)))
                .await?;
            self.push_file_list().await?;
            // Others only get a nudge to re-request the listing themselves.
            self.registry
                .broadcast_to_others(&Message::list_files_request(), self.conn_id)
                .await;
            Ok(())
        } else {
            self.send(&Message::error(
                "CREATE_ERROR",
                "Dosya oluşturulamadı (zaten var olabilir)",
            ))
            .await
        }
    }

    async fn handle_save_file(&self, file_name: &str, content: &str) -> Result<()> {
        let written = self.store.lock().await.write(file_name, content);
        match written {
            Ok(()) => {
                self.send(&Message::success(&format!("Dosya kaydedildi: {}", file_name)))
                    .await
            }
            Err(e) => self.send(&Message::error("SAVE_ERROR", &e.to_string())).await,
        }
    }

    async fn send(&self, message: &Message) -> Result<()> {
        self.tx.send(message.encode()).await?;
        Ok(())
    }
}
