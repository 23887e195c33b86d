use bincode::{deserialize, serialize};
use clap::Parser;
use rand::Rng;
use shared::{InputState, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout, Instant};

/// Headless bot: connects, joins a room, starts it and wanders while shooting.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Room to join
    #[arg(short, long, default_value = "lobby")]
    room: String,

    /// Display name
    #[arg(short, long, default_value = "bot")]
    name: String,

    /// How long to play, in seconds
    #[arg(short, long, default_value = "10")]
    duration: u64,
}

async fn send(socket: &UdpSocket, packet: &Packet, server: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, server).await?;
    Ok(())
}

async fn recv(socket: &UdpSocket, wait: Duration) -> Option<Packet> {
    let mut buf = vec![0u8; MAX_PACKET_SIZE];
    match timeout(wait, socket.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => deserialize::<Packet>(&buf[0..len]).ok(),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    let server = args.server.parse::<SocketAddr>()?;
    println!("Client socket bound to {}", socket.local_addr()?);

    send(
        &socket,
        &Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: args.name.clone(),
        },
        server,
    )
    .await?;

    let client_id = match recv(&socket, Duration::from_secs(2)).await {
        Some(Packet::Connected { client_id }) => client_id,
        other => {
            println!("Expected Connected but got: {:?}", other);
            return Ok(());
        }
    };
    println!("Connected with client ID: {}", client_id);

    send(&socket, &Packet::JoinRoom { room: args.room.clone() }, server).await?;
    send(&socket, &Packet::StartGame, server).await?;

    let mut rng = rand::thread_rng();
    let mut sequence = 0u32;
    let mut heading = (1.0f32, 0.0f32);
    let deadline = Instant::now() + Duration::from_secs(args.duration);

    while Instant::now() < deadline {
        if rng.gen_bool(0.05) {
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            heading = (angle.cos(), angle.sin());
        }
        let aim = rng.gen_range(0.0..std::f32::consts::TAU);

        sequence += 1;
        let input = InputState {
            move_x: heading.0,
            move_y: heading.1,
            shoot_x: aim.cos(),
            shoot_y: aim.sin(),
            is_shooting: true,
        };
        send(&socket, &Packet::Input { sequence, input }, server).await?;

        while let Some(packet) = recv(&socket, Duration::from_millis(1)).await {
            match packet {
                Packet::GameState { tick, snapshot, .. } if tick % 30 == 0 => {
                    println!(
                        "tick {}: wave {}, score {}, {} pursuers, {} projectiles",
                        tick,
                        snapshot.wave,
                        snapshot.score,
                        snapshot.pursuers.len(),
                        snapshot.projectiles.len()
                    );
                }
                Packet::GameState { .. } => {}
                Packet::GameOver { result } => {
                    println!(
                        "Game over: score {}, wave {}",
                        result.final_score, result.final_wave
                    );
                    send(&socket, &Packet::Disconnect, server).await?;
                    return Ok(());
                }
                other => println!("Received packet: {:?}", other),
            }
        }

        sleep(Duration::from_millis(33)).await;
    }

    println!("Sending disconnect request");
    send(&socket, &Packet::Disconnect, server).await?;
    println!("Test client finished");

    Ok(())
}
