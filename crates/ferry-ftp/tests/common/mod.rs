//! In-process FTP server for integration tests: passive mode, Unix-style
//! LIST output, an in-memory tree.

#![allow(dead_code)]

use ferry_ftp::{FtpConnectionConfig, FtpConnectionPool, PoolConfig};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Default)]
struct ServerState {
    tree: Mutex<BTreeMap<String, Node>>,
    deny_cwd: Mutex<HashSet<String>>,
    list_replies: Mutex<HashMap<String, String>>,
    commands: Mutex<Vec<String>>,
    sessions: Mutex<usize>,
}

pub struct MockFtpServer {
    pub addr: SocketAddr,
    state: Arc<ServerState>,
}

impl MockFtpServer {
    /// Server holding `files` (absolute path, content); parent directories
    /// are created implicitly.
    pub async fn start(files: &[(&str, &str)]) -> Self {
        let state = Arc::new(ServerState::default());
        {
            let mut tree = state.tree.lock().unwrap();
            tree.insert("/".into(), Node::Dir);
            for (path, content) in files {
                let mut parent = parent_of(path);
                while parent != "/" {
                    tree.insert(parent.clone(), Node::Dir);
                    parent = parent_of(&parent);
                }
                tree.insert(path.to_string(), Node::File(content.as_bytes().to_vec()));
            }
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((sock, _)) = listener.accept().await {
                *accept_state.sessions.lock().unwrap() += 1;
                tokio::spawn(session(sock, accept_state.clone()));
            }
        });
        Self { addr, state }
    }

    /// The standard listing fixture: five files under `/data`, two more in
    /// `/data/subDirectory`, all containing `foo`.
    pub async fn with_listing_fixture() -> Self {
        let paths: Vec<String> = (1..=5)
            .map(|i| format!("/data/test-file-{}.html", i))
            .chain((6..=7).map(|i| format!("/data/subDirectory/test-file-{}.html", i)))
            .collect();
        let files: Vec<(&str, &str)> = paths.iter().map(|p| (p.as_str(), "foo")).collect();
        Self::start(&files).await
    }

    pub fn deny_cwd(&self, path: &str) {
        self.state.deny_cwd.lock().unwrap().insert(path.to_string());
    }

    /// Send `reply` instead of `226` once a LIST of `path` has been sent.
    pub fn finish_list_with(&self, path: &str, reply: &str) {
        self.state
            .list_replies
            .lock()
            .unwrap()
            .insert(path.to_string(), reply.to_string());
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.commands.lock().unwrap().clone()
    }

    pub fn count_commands(&self, verb: &str) -> usize {
        self.commands().iter().filter(|c| c.starts_with(verb)).count()
    }

    pub fn sessions(&self) -> usize {
        *self.state.sessions.lock().unwrap()
    }

    pub fn config(&self) -> FtpConnectionConfig {
        FtpConnectionConfig {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            username: "tester".into(),
            password: "secret".into(),
            connect_timeout_sec: 5,
            data_timeout_sec: 5,
            ..Default::default()
        }
    }

    pub fn pool(&self) -> FtpConnectionPool {
        self.pool_with(PoolConfig::default())
    }

    pub fn pool_with(&self, pool_config: PoolConfig) -> FtpConnectionPool {
        FtpConnectionPool::new(self.config(), pool_config)
    }
}

fn parent_of(path: &str) -> String {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/".into(),
        Some(i) => path[..i].to_string(),
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn resolve(cwd: &str, arg: &str) -> String {
    let joined = if arg.starts_with('/') {
        arg.to_string()
    } else {
        format!("{}/{}", cwd, arg)
    };
    let mut parts: Vec<&str> = Vec::new();
    for seg in joined.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}

fn unix_line(name: &str, node: &Node) -> String {
    match node {
        Node::Dir => format!("drwxr-xr-x 2 owner group 4096 Jan  1 12:00 {}\r\n", name),
        Node::File(data) => format!(
            "-rw-r--r-- 1 owner group {} Jan  1 12:00 {}\r\n",
            data.len(),
            name
        ),
    }
}

async fn session(sock: TcpStream, state: Arc<ServerState>) {
    let (rd, mut wr) = sock.into_split();
    let mut lines = BufReader::new(rd).lines();
    let mut cwd = "/".to_string();
    let mut passive: Option<TcpListener> = None;

    if wr.write_all(b"220 mock ready\r\n").await.is_err() {
        return;
    }

    while let Ok(Some(line)) = lines.next_line().await {
        state.commands.lock().unwrap().push(line.clone());
        let (verb, arg) = match line.split_once(' ') {
            Some((v, a)) => (v.to_uppercase(), a.to_string()),
            None => (line.to_uppercase(), String::new()),
        };

        let reply: String = match verb.as_str() {
            "USER" => "331 password please\r\n".into(),
            "PASS" => "230 logged in\r\n".into(),
            "FEAT" => "211-Features:\r\n SIZE\r\n UTF8\r\n211 End\r\n".into(),
            "OPTS" | "TYPE" => "200 ok\r\n".into(),
            "SYST" => "215 UNIX Type: L8\r\n".into(),
            "NOOP" => "200 noop\r\n".into(),
            "PWD" => format!("257 \"{}\" is cwd\r\n", cwd),
            "CWD" => {
                let target = resolve(&cwd, &arg);
                let is_dir = matches!(state.tree.lock().unwrap().get(&target), Some(Node::Dir));
                let denied = state.deny_cwd.lock().unwrap().contains(&target);
                if is_dir && !denied {
                    cwd = target;
                    "250 ok\r\n".into()
                } else {
                    "550 No such directory\r\n".into()
                }
            }
            "CDUP" => {
                cwd = parent_of(&cwd);
                "250 ok\r\n".into()
            }
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let port = listener.local_addr().unwrap().port();
                passive = Some(listener);
                format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{})\r\n",
                    port / 256,
                    port % 256
                )
            }
            "SIZE" => {
                let target = resolve(&cwd, &arg);
                let size = match state.tree.lock().unwrap().get(&target) {
                    Some(Node::File(data)) => Some(data.len()),
                    _ => None,
                };
                match size {
                    Some(n) => format!("213 {}\r\n", n),
                    None => "550 No such file\r\n".into(),
                }
            }
            "LIST" | "RETR" => {
                let target = if arg.is_empty() { cwd.clone() } else { resolve(&cwd, &arg) };
                let payload = {
                    let tree = state.tree.lock().unwrap();
                    match (verb.as_str(), tree.get(&target)) {
                        ("LIST", Some(Node::Dir)) => {
                            let mut out = unix_line(".", &Node::Dir) + &unix_line("..", &Node::Dir);
                            for (path, node) in tree.iter() {
                                if path != "/" && parent_of(path) == target {
                                    out.push_str(&unix_line(base_name(path), node));
                                }
                            }
                            Some(out.into_bytes())
                        }
                        ("LIST", Some(node)) => Some(unix_line(base_name(&target), node).into_bytes()),
                        ("RETR", Some(Node::File(data))) => Some(data.clone()),
                        _ => None,
                    }
                };
                let (Some(payload), Some(listener)) = (payload, passive.take()) else {
                    if wr.write_all(b"550 No such file or directory\r\n").await.is_err() {
                        return;
                    }
                    continue;
                };
                if wr.write_all(b"150 opening data connection\r\n").await.is_err() {
                    return;
                }
                if let Ok((mut data, _)) = listener.accept().await {
                    let _ = data.write_all(&payload).await;
                    let _ = data.shutdown().await;
                }
                let custom = match verb.as_str() {
                    "LIST" => state.list_replies.lock().unwrap().get(&target).cloned(),
                    _ => None,
                };
                match custom {
                    Some(reply) => format!("{}\r\n", reply),
                    None => "226 transfer complete\r\n".into(),
                }
            }
            "QUIT" => {
                let _ = wr.write_all(b"221 bye\r\n").await;
                return;
            }
            _ => "502 not implemented\r\n".into(),
        };

        if wr.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}
