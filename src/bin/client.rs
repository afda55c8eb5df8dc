use anyhow::Result;
use collab_edit::protocol::{Message, MessageType};
use std::env;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Line-mode client for poking the server by hand. Not an editor:
/// `edit` and `save` take the whole document on one line, with `\n`
/// standing in for newlines.
#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let addr = env::var("SERVER_ADDR").unwrap_or("127.0.0.1:9999".to_string());
    let stream = TcpStream::connect(&addr).await?;
    println!("Connected to {}", addr);
    println!("Commands: login <name> | list | open <file> | create <file> | save <file> <text> | edit <file> <text> | raw <line> | quit");

    let (read_half, mut writer) = stream.into_split();

    tokio::spawn(async move {
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    println!("Server disconnected");
                    std::process::exit(0);
                }
                Ok(_) => print_incoming(&Message::decode(line.trim_end_matches('\n'))),
                Err(e) => {
                    eprintln!("Read error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    });

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        if stdin.read_line(&mut input).await? == 0 {
            break;
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }

        let outbound = match build_message(line) {
            Some(wire) => wire,
            None => {
                println!("Unrecognized command: {}", line);
                continue;
            }
        };

        writer.write_all(outbound.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}

fn build_message(line: &str) -> Option<String> {
    let (command, rest) = match line.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let message = match command {
        "login" if !rest.is_empty() => Message::login(rest),
        "list" => Message::list_files_request(),
        "open" if !rest.is_empty() => Message::open_file_request(rest),
        "create" if !rest.is_empty() => Message::create_file(rest),
        "save" => {
            let (file, text) = rest.split_once(' ')?;
            Message::save_file(file, &text.replace("\\n", "\n"))
        }
        "edit" => {
            let (file, text) = rest.split_once(' ')?;
            Message::edit(file, &text.replace("\\n", "\n"))
        }
        "raw" if !rest.is_empty() => return Some(rest.to_string()),
        _ => return None,
    };
    Some(message.encode())
}

fn print_incoming(message: &Message) {
    match message.msg_type() {
        MessageType::Success => println!("OK: {}", message.parameter1()),
        MessageType::Error => println!(
            "ERROR [{}]: {}",
            message.parameter1(),
            message.parameter2()
        ),
        MessageType::ListFilesResponse => println!("Files: {}", message.parameter1()),
        MessageType::OpenFileResponse => {
            println!("--- {} ---", message.parameter1());
            println!("{}", message.parameter2());
            println!("--- end ---");
        }
        MessageType::Edit => {
            println!("[{} was edited by another user]", message.parameter1());
            println!("{}", message.parameter2());
        }
        MessageType::UserJoined => println!("* {} joined", message.parameter1()),
        MessageType::UserLeft => println!("* {} left", message.parameter1()),
        MessageType::ListFilesRequest => {
            // Server-side nudge after someone created a file; a real
            // client would re-request the listing here.
            println!("[file list changed, run `list`]");
        }
        _ => println!("<- {}", message.encode()),
    }
}
