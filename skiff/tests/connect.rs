#![allow(clippy::unwrap_used)]

mod common;

use async_std::net::TcpStream;

use skiff::{
    algorithm::{Cipher, Hmac},
    session::{Algorithms, Config},
    Result, Session,
};
use skiff_connect::{Channel, Error as ConnectError, Options};

use common::{ServerKex, ServerSession};

const CHUNK: usize = 32 * 1024;
const TOTAL: usize = 200 * 1024;
const WINDOW: u32 = 64 * 1024;

fn config() -> Config {
    Config {
        algorithms: Algorithms {
            kexs: vec!["diffie-hellman-group14-sha256".parse().unwrap()],
            ciphers: vec![Cipher::Aes128Ctr],
            macs: vec![Hmac::HmacSha256],
            ..Default::default()
        },
        timeout: std::time::Duration::from_secs(10),
        ..Default::default()
    }
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|index| (index % 251) as u8).collect()
}

#[async_std::test]
async fn writes_stall_on_window_credit_and_recover() -> Result<(), Box<dyn std::error::Error>> {
    let (addr, handle) = common::spawn(|socket| async move {
        let mut server = ServerSession::handshake(
            socket,
            ServerKex::Group14Sha256,
            Cipher::Aes128Ctr,
            Hmac::HmacSha256,
        )
        .await?;

        let client_channel = server.accept_channel(WINDOW, CHUNK as u32).await?;

        let mut received = Vec::with_capacity(TOTAL);
        let mut granted = WINDOW as usize;
        let mut since_adjust = 0usize;

        while received.len() < TOTAL {
            let data = server.recv_channel_data().await?;

            assert!(data.len() <= CHUNK, "oversized segment: {}", data.len());
            received.extend_from_slice(&data);
            assert!(
                received.len() <= granted,
                "client overran the window: {} > {granted}",
                received.len(),
            );

            since_adjust += data.len();
            if since_adjust >= WINDOW as usize {
                since_adjust -= WINDOW as usize;
                granted += WINDOW as usize;

                server.adjust_window(client_channel, WINDOW).await?;
            }
        }

        // Every byte arrived, in order.
        assert_eq!(received, pattern(TOTAL));

        // Then the close handshake, both directions.
        server
            .stream
            .recv_expected(<skiff::msg::connect::ChannelClose as skiff::msg::Packet>::NUMBER)
            .await?;
        server
            .stream
            .send(&skiff::msg::connect::ChannelClose {
                recipient_channel: client_channel,
            })
            .await?;

        Ok(())
    })
    .await?;

    let socket = TcpStream::connect(addr).await?;
    let session = Session::new(socket, config()).await?;

    let mut channel = Channel::open(session, &Options::default()).await?;
    channel.send_data(&pattern(TOTAL)).await?;
    channel.close().await?;

    handle.await?;

    Ok(())
}

#[async_std::test]
async fn refused_subsystems_surface_as_errors() -> Result<(), Box<dyn std::error::Error>> {
    let (addr, handle) = common::spawn(|socket| async move {
        let mut server = ServerSession::handshake(
            socket,
            ServerKex::Group14Sha256,
            Cipher::Aes128Ctr,
            Hmac::HmacSha256,
        )
        .await?;

        let client_channel = server.accept_channel(WINDOW, CHUNK as u32).await?;
        server.answer_subsystem(client_channel, false).await?;

        Ok(())
    })
    .await?;

    let socket = TcpStream::connect(addr).await?;
    let session = Session::new(socket, config()).await?;

    let mut channel = Channel::open(session, &Options::default()).await?;
    let outcome = channel.subsystem("sftp").await;

    match outcome {
        Err(ConnectError::SubsystemStartFailed(name)) => assert_eq!(name, "sftp"),
        other => panic!("expected a subsystem failure, got {other:?}"),
    }

    handle.await?;

    Ok(())
}
