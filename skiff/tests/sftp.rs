#![allow(clippy::unwrap_used)]

mod common;

use async_std::net::TcpStream;

use skiff::{
    algorithm::{Cipher, Hmac},
    session::{Algorithms, Config},
    wire::{Reader, Writer},
    Result, Session,
};
use skiff_connect::{Channel, Options};
use skiff_sftp::{Attrs, OpenFlags, SftpClient};

use common::{ServerKex, ServerSession};

fn config() -> Config {
    Config {
        algorithms: Algorithms {
            kexs: vec!["ecdh-sha2-nistp256".parse().unwrap()],
            ciphers: vec![Cipher::Aes128Ctr],
            macs: vec![Hmac::HmacSha256],
            ..Default::default()
        },
        timeout: std::time::Duration::from_secs(10),
        ..Default::default()
    }
}

/// Pull whole SFTP records out of the channel data stream.
struct RecordReader {
    buf: Vec<u8>,
}

impl RecordReader {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    async fn next(&mut self, server: &mut ServerSession) -> Result<Vec<u8>> {
        loop {
            if self.buf.len() >= 4 {
                let length =
                    u32::from_be_bytes(self.buf[..4].try_into().expect("sliced 4 bytes")) as usize;

                if self.buf.len() >= 4 + length {
                    let record = self.buf[4..4 + length].to_vec();
                    self.buf.drain(..4 + length);

                    return Ok(record);
                }
            }

            let data = server.recv_channel_data().await?;
            self.buf.extend_from_slice(&data);
        }
    }
}

fn record(body: impl FnOnce(&mut Writer)) -> Vec<u8> {
    let mut payload = Writer::new();
    body(&mut payload);
    let payload = payload.finish();

    let mut framed = Writer::new();
    framed.u32(payload.len() as u32);
    framed.raw(&payload);

    framed.finish()
}

async fn send_record(server: &mut ServerSession, channel: u32, data: Vec<u8>) -> Result<()> {
    server
        .stream
        .send(&skiff::msg::connect::ChannelData {
            recipient_channel: channel,
            data,
        })
        .await
}

#[async_std::test]
async fn uploads_complete_against_reordered_replies() -> Result<(), Box<dyn std::error::Error>> {
    let (addr, handle) = common::spawn(|socket| async move {
        let mut server = ServerSession::handshake(
            socket,
            ServerKex::EcdhNistp256,
            Cipher::Aes128Ctr,
            Hmac::HmacSha256,
        )
        .await?;

        let client_channel = server.accept_channel(256 * 1024, 32 * 1024).await?;
        server.answer_subsystem(client_channel, true).await?;

        let mut records = RecordReader::new();

        // INIT -> VERSION.
        let init = records.next(&mut server).await?;
        assert_eq!(init, [1, 0, 0, 0, 3]);
        send_record(
            &mut server,
            client_channel,
            record(|writer| {
                writer.u8(2);
                writer.u32(3);
            }),
        )
        .await?;

        // OPEN -> HANDLE.
        let open = records.next(&mut server).await?;
        let mut reader = Reader::new(&open);
        assert_eq!(reader.u8()?, 3);
        let open_id = reader.u32()?;
        assert_eq!(reader.utf8()?, "/data/upload");
        send_record(
            &mut server,
            client_channel,
            record(|writer| {
                writer.u8(102);
                writer.u32(open_id);
                writer.string(b"H#1");
            }),
        )
        .await?;

        // Four pipelined writes, answered in reverse order.
        let mut write_ids = Vec::new();
        for _ in 0..4 {
            let write = records.next(&mut server).await?;
            let mut reader = Reader::new(&write);
            assert_eq!(reader.u8()?, 6);
            let id = reader.u32()?;
            assert_eq!(reader.string()?, b"H#1");
            let offset = reader.u64()?;
            let data = reader.string()?;
            assert_eq!(data.len(), 1024);
            assert_eq!(offset % 1024, 0);

            write_ids.push(id);
        }
        for &id in write_ids.iter().rev() {
            send_record(
                &mut server,
                client_channel,
                record(|writer| {
                    writer.u8(101);
                    writer.u32(id);
                    writer.u32(0);
                    writer.string(b"");
                    writer.string(b"");
                }),
            )
            .await?;
        }

        // CLOSE -> STATUS(OK).
        let close = records.next(&mut server).await?;
        let mut reader = Reader::new(&close);
        assert_eq!(reader.u8()?, 4);
        let close_id = reader.u32()?;
        assert_eq!(reader.string()?, b"H#1");
        send_record(
            &mut server,
            client_channel,
            record(|writer| {
                writer.u8(101);
                writer.u32(close_id);
                writer.u32(0);
                writer.string(b"");
                writer.string(b"");
            }),
        )
        .await?;

        // STAT -> ATTRS with the final size.
        let stat = records.next(&mut server).await?;
        let mut reader = Reader::new(&stat);
        assert_eq!(reader.u8()?, 17);
        let stat_id = reader.u32()?;
        send_record(
            &mut server,
            client_channel,
            record(|writer| {
                writer.u8(105);
                writer.u32(stat_id);
                Attrs::with_size(4096).encode(writer);
            }),
        )
        .await?;

        Ok(())
    })
    .await?;

    let socket = TcpStream::connect(addr).await?;
    let session = Session::new(socket, config()).await?;

    let mut channel = Channel::open(session, &Options::default()).await?;
    channel.subsystem("sftp").await?;

    let mut sftp = SftpClient::start(channel, Some(std::time::Duration::from_secs(10))).await?;
    assert_eq!(sftp.version(), 3);

    let handle_id = sftp
        .open(
            "/data/upload",
            OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            &Attrs::default(),
        )
        .await?;

    // Four 1KiB writes kept in flight together.
    let mut pending = Vec::new();
    for index in 0..4u64 {
        pending.push(
            sftp.submit_write(&handle_id, index * 1024, &[index as u8; 1024])
                .await?,
        );
    }
    for id in pending {
        sftp.complete_write(id).await?;
    }

    sftp.close(handle_id).await?;

    let attrs = sftp.stat("/data/upload").await?;
    assert_eq!(attrs.size, Some(4096));

    handle.await?;

    Ok(())
}
