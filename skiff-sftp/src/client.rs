//! The request/response engine: request-id allocation, the pending
//! table, reply routing and the file operations themselves.

use std::collections::HashMap;

use futures::{AsyncRead, AsyncWrite};
use futures_time::future::FutureExt as _;

use skiff::wire::{Reader, Writer};

use crate::{
    frame::Chunker,
    proto::{self, status_error, Attrs, DirEntry, Handle, OpenFlags, StatusCode},
    Error, Result,
};

/// The identifier correlating a request with its reply.
pub type RequestId = u32;

/// The byte link the engine multiplexes over, implemented by
/// [`skiff_connect::Channel`].
pub trait Link: Send {
    /// Send one chunk of subsystem data.
    fn send(&mut self, data: &[u8]) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Receive one chunk of subsystem data, `None` once the peer is
    /// done sending.
    fn recv(&mut self) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
}

impl<IO> Link for skiff_connect::Channel<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        Ok(self.send_data(data).await?)
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.recv_data().await?)
    }
}

/// A decoded reply, parked in the table until its requester claims it.
#[derive(Debug)]
enum Reply {
    Status { code: StatusCode, message: String },
    Handle(Vec<u8>),
    Data(Vec<u8>),
    Name(Vec<DirEntry>),
    Attrs(Attrs),
}

#[derive(Debug)]
enum Pending {
    Waiting,
    Done(Reply),
}

/// An SFTP v3 client engine over a [`Link`].
///
/// Requests may be pipelined: every operation is a `submit` followed
/// by a `resolve`, and replies are routed strictly by request id, in
/// whatever order the server produces them.
pub struct SftpClient<L> {
    link: L,
    chunker: Chunker,

    version: u32,
    extensions: HashMap<String, Vec<u8>>,

    next_id: RequestId,
    pending: HashMap<RequestId, Pending>,

    /// The per-request deadline; `None` waits indefinitely.
    operation_timeout: Option<std::time::Duration>,

    dead: bool,
}

impl<L: Link> SftpClient<L> {
    /// Negotiate the protocol over a fresh subsystem channel:
    /// `SSH_FXP_INIT` out, `SSH_FXP_VERSION` in, settling on the
    /// lower version and collecting the server's extension pairs.
    pub async fn start(link: L, operation_timeout: Option<std::time::Duration>) -> Result<Self> {
        let mut client = Self {
            link,
            chunker: Chunker::default(),
            version: proto::OUR_VERSION,
            extensions: HashMap::new(),
            next_id: 0,
            pending: HashMap::new(),
            operation_timeout,
            dead: false,
        };

        let mut init = Writer::new();
        init.u32(5);
        init.u8(proto::INIT);
        init.u32(proto::OUR_VERSION);
        client.link.send(&init.finish()).await?;

        let record = loop {
            if let Some(record) = client.chunker.next()? {
                break record;
            }

            match client.link.recv().await? {
                Some(bytes) => client.chunker.extend(&bytes),
                None => return Err(Error::ConnectionLost),
            }
        };

        let mut reader = Reader::new(&record);
        if reader.u8()? != proto::VERSION {
            return Err(Error::BadMessage);
        }

        client.version = reader.u32()?.min(proto::OUR_VERSION);
        while !reader.is_empty() {
            let name = reader.utf8()?.to_owned();
            let data = reader.string()?.to_owned();

            client.extensions.insert(name, data);
        }

        tracing::debug!("SFTP session negotiated at version {}", client.version);

        Ok(client)
    }

    /// The negotiated protocol version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The extension pairs announced by the server.
    pub fn extensions(&self) -> &HashMap<String, Vec<u8>> {
        &self.extensions
    }

    /// Forget a pending request.
    ///
    /// The server's eventual reply is dropped on arrival; a handle it
    /// may carry leaks server-side unless separately closed.
    pub fn cancel(&mut self, id: RequestId) {
        if self.pending.remove(&id).is_some() {
            tracing::debug!("Cancelled request {id}");
        }
    }

    // File operations, request/reply per the v3 table.

    /// Open (or create) a file, returning its handle.
    pub async fn open(&mut self, path: &str, flags: OpenFlags, attrs: &Attrs) -> Result<Handle> {
        let id = self
            .submit(proto::OPEN, |writer| {
                writer.string(path.as_bytes());
                writer.u32(flags.bits());
                attrs.encode(writer);
            })
            .await?;

        self.resolve_handle(id).await
    }

    /// Close a handle, consuming it.
    pub async fn close(&mut self, handle: Handle) -> Result<()> {
        let id = self
            .submit(proto::CLOSE, |writer| writer.string(&handle.0))
            .await?;

        self.resolve_status(id).await
    }

    /// Read up to `length` bytes at `offset`, `None` at end-of-file.
    pub async fn read(
        &mut self,
        handle: &Handle,
        offset: u64,
        length: u32,
    ) -> Result<Option<Vec<u8>>> {
        let id = self.submit_read(handle, offset, length).await?;

        self.complete_read(id).await
    }

    /// Write `data` at `offset`.
    pub async fn write(&mut self, handle: &Handle, offset: u64, data: &[u8]) -> Result<()> {
        let id = self.submit_write(handle, offset, data).await?;

        self.complete_write(id).await
    }

    /// Queue a read without waiting for its reply.
    pub async fn submit_read(
        &mut self,
        handle: &Handle,
        offset: u64,
        length: u32,
    ) -> Result<RequestId> {
        self.submit(proto::READ, |writer| {
            writer.string(&handle.0);
            writer.u64(offset);
            writer.u32(length);
        })
        .await
    }

    /// Claim the reply of a queued read.
    pub async fn complete_read(&mut self, id: RequestId) -> Result<Option<Vec<u8>>> {
        match self.resolve(id).await? {
            Reply::Data(data) => Ok(Some(data)),
            Reply::Status {
                code: StatusCode::Eof,
                ..
            } => Ok(None),
            Reply::Status { code, message } => Err(status_error(code, message)),
            _ => Err(Error::BadMessage),
        }
    }

    /// Queue a write without waiting for its reply.
    pub async fn submit_write(
        &mut self,
        handle: &Handle,
        offset: u64,
        data: &[u8],
    ) -> Result<RequestId> {
        self.submit(proto::WRITE, |writer| {
            writer.string(&handle.0);
            writer.u64(offset);
            writer.string(data);
        })
        .await
    }

    /// Claim the reply of a queued write.
    pub async fn complete_write(&mut self, id: RequestId) -> Result<()> {
        self.resolve_status(id).await
    }

    /// Stat a path, following symlinks.
    pub async fn stat(&mut self, path: &str) -> Result<Attrs> {
        let id = self
            .submit(proto::STAT, |writer| writer.string(path.as_bytes()))
            .await?;

        self.resolve_attrs(id).await
    }

    /// Stat a path, without following symlinks.
    pub async fn lstat(&mut self, path: &str) -> Result<Attrs> {
        let id = self
            .submit(proto::LSTAT, |writer| writer.string(path.as_bytes()))
            .await?;

        self.resolve_attrs(id).await
    }

    /// Stat an open handle.
    pub async fn fstat(&mut self, handle: &Handle) -> Result<Attrs> {
        let id = self
            .submit(proto::FSTAT, |writer| writer.string(&handle.0))
            .await?;

        self.resolve_attrs(id).await
    }

    /// Change attributes of a path.
    pub async fn setstat(&mut self, path: &str, attrs: &Attrs) -> Result<()> {
        let id = self
            .submit(proto::SETSTAT, |writer| {
                writer.string(path.as_bytes());
                attrs.encode(writer);
            })
            .await?;

        self.resolve_status(id).await
    }

    /// Change attributes of an open handle.
    pub async fn fsetstat(&mut self, handle: &Handle, attrs: &Attrs) -> Result<()> {
        let id = self
            .submit(proto::FSETSTAT, |writer| {
                writer.string(&handle.0);
                attrs.encode(writer);
            })
            .await?;

        self.resolve_status(id).await
    }

    /// Open a directory for listing.
    pub async fn opendir(&mut self, path: &str) -> Result<Handle> {
        let id = self
            .submit(proto::OPENDIR, |writer| writer.string(path.as_bytes()))
            .await?;

        self.resolve_handle(id).await
    }

    /// Read the next batch of directory entries, `None` once the
    /// listing is exhausted.
    pub async fn readdir(&mut self, handle: &Handle) -> Result<Option<Vec<DirEntry>>> {
        let id = self
            .submit(proto::READDIR, |writer| writer.string(&handle.0))
            .await?;

        match self.resolve(id).await? {
            Reply::Name(entries) => Ok(Some(entries)),
            Reply::Status {
                code: StatusCode::Eof,
                ..
            } => Ok(None),
            Reply::Status { code, message } => Err(status_error(code, message)),
            _ => Err(Error::BadMessage),
        }
    }

    /// Remove a file.
    pub async fn remove(&mut self, path: &str) -> Result<()> {
        let id = self
            .submit(proto::REMOVE, |writer| writer.string(path.as_bytes()))
            .await?;

        self.resolve_status(id).await
    }

    /// Create a directory.
    pub async fn mkdir(&mut self, path: &str, attrs: &Attrs) -> Result<()> {
        let id = self
            .submit(proto::MKDIR, |writer| {
                writer.string(path.as_bytes());
                attrs.encode(writer);
            })
            .await?;

        self.resolve_status(id).await
    }

    /// Remove a directory.
    pub async fn rmdir(&mut self, path: &str) -> Result<()> {
        let id = self
            .submit(proto::RMDIR, |writer| writer.string(path.as_bytes()))
            .await?;

        self.resolve_status(id).await
    }

    /// Rename a file or directory.
    pub async fn rename(&mut self, oldpath: &str, newpath: &str) -> Result<()> {
        let id = self
            .submit(proto::RENAME, |writer| {
                writer.string(oldpath.as_bytes());
                writer.string(newpath.as_bytes());
            })
            .await?;

        self.resolve_status(id).await
    }

    /// Canonicalize a path server-side.
    pub async fn realpath(&mut self, path: &str) -> Result<String> {
        let id = self
            .submit(proto::REALPATH, |writer| writer.string(path.as_bytes()))
            .await?;

        match self.resolve(id).await? {
            Reply::Name(entries) => entries
                .into_iter()
                .next()
                .map(|entry| entry.filename)
                .ok_or(Error::BadMessage),
            Reply::Status { code, message } => Err(status_error(code, message)),
            _ => Err(Error::BadMessage),
        }
    }

    // Engine internals.

    /// Frame and send one request, inserting its table entry.
    async fn submit(&mut self, kind: u8, body: impl FnOnce(&mut Writer)) -> Result<RequestId> {
        if self.dead {
            return Err(Error::ConnectionLost);
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let mut payload = Writer::new();
        payload.u8(kind);
        payload.u32(id);
        body(&mut payload);
        let payload = payload.finish();

        let mut record = Writer::new();
        record.u32(payload.len() as u32);
        record.raw(&payload);

        self.pending.insert(id, Pending::Waiting);

        if let Err(err) = self.link.send(&record.finish()).await {
            self.pending.remove(&id);

            return Err(err);
        }

        tracing::trace!("~~> sftp #{id}: ^{kind:#x} ({} bytes)", payload.len());

        Ok(id)
    }

    /// Pump the link until the reply for `id` landed, routing every
    /// other reply to its own table entry on the way.
    async fn resolve(&mut self, id: RequestId) -> Result<Reply> {
        let deadline = self.operation_timeout;

        let pump = async {
            loop {
                match self.pending.remove(&id) {
                    Some(Pending::Done(reply)) => break Ok(reply),
                    Some(waiting) => {
                        self.pending.insert(id, waiting);
                    }
                    // Nobody waits on an id twice; a missing entry
                    // means it was cancelled.
                    None => break Err(Error::Cancelled),
                }

                if self.dead {
                    break Err(Error::ConnectionLost);
                }

                if let Some(record) = self.chunker.next()? {
                    self.dispatch(&record)?;

                    continue;
                }

                match self.link.recv().await? {
                    Some(bytes) => self.chunker.extend(&bytes),
                    None => {
                        self.dead = true;
                        self.pending.retain(|_, slot| matches!(slot, Pending::Done(_)));

                        break Err(Error::ConnectionLost);
                    }
                }
            }
        };

        match deadline {
            None => pump.await,
            Some(deadline) => match pump
                .timeout(futures_time::time::Duration::from(deadline))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.pending.remove(&id);

                    Err(Error::Timeout)
                }
            },
        }
    }

    async fn resolve_status(&mut self, id: RequestId) -> Result<()> {
        match self.resolve(id).await? {
            Reply::Status {
                code: StatusCode::Ok,
                ..
            } => Ok(()),
            Reply::Status { code, message } => Err(status_error(code, message)),
            _ => Err(Error::BadMessage),
        }
    }

    async fn resolve_handle(&mut self, id: RequestId) -> Result<Handle> {
        match self.resolve(id).await? {
            Reply::Handle(handle) => Ok(Handle(handle)),
            Reply::Status { code, message } => Err(status_error(code, message)),
            _ => Err(Error::BadMessage),
        }
    }

    async fn resolve_attrs(&mut self, id: RequestId) -> Result<Attrs> {
        match self.resolve(id).await? {
            Reply::Attrs(attrs) => Ok(attrs),
            Reply::Status { code, message } => Err(status_error(code, message)),
            _ => Err(Error::BadMessage),
        }
    }

    /// Decode one record and route it by request id.
    fn dispatch(&mut self, record: &[u8]) -> Result<()> {
        let mut reader = Reader::new(record);

        let kind = reader.u8()?;
        let id = reader.u32()?;

        let reply = match kind {
            proto::STATUS => {
                let code = StatusCode::from(reader.u32()?);

                // The message and language tag are absent from some
                // ancient servers.
                let message = if reader.is_empty() {
                    String::new()
                } else {
                    reader.utf8()?.to_owned()
                };

                Reply::Status { code, message }
            }
            proto::HANDLE => Reply::Handle(reader.string()?.to_owned()),
            proto::DATA => Reply::Data(reader.string()?.to_owned()),
            proto::NAME => {
                let count = reader.u32()?;
                let mut entries = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    entries.push(DirEntry::decode(&mut reader)?);
                }

                Reply::Name(entries)
            }
            proto::ATTRS => Reply::Attrs(Attrs::decode(&mut reader)?),
            _ => return Err(Error::BadMessage),
        };

        tracing::trace!("<~~ sftp #{id}: ^{kind:#x}");

        match self.pending.get_mut(&id) {
            Some(slot @ Pending::Waiting) => *slot = Pending::Done(reply),
            Some(Pending::Done(_)) => return Err(Error::BadMessage),
            None => tracing::debug!("Dropped a reply for unknown request {id}"),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    #[derive(Default)]
    struct ScriptState {
        sent: Vec<Vec<u8>>,
        inbound: VecDeque<Vec<u8>>,
        hang_when_drained: bool,
    }

    /// A [`Link`] fed by the test, sharing its state so replies can
    /// be queued after requests went out.
    #[derive(Clone, Default)]
    struct ScriptedLink {
        state: Arc<Mutex<ScriptState>>,
    }

    impl ScriptedLink {
        fn push(&self, record: Vec<u8>) {
            self.state.lock().expect("lock").inbound.push_back(record);
        }

        fn sent(&self) -> usize {
            self.state.lock().expect("lock").sent.len()
        }
    }

    impl Link for ScriptedLink {
        async fn send(&mut self, data: &[u8]) -> Result<()> {
            self.state.lock().expect("lock").sent.push(data.to_vec());

            Ok(())
        }

        async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
            loop {
                {
                    let mut state = self.state.lock().expect("lock");

                    if let Some(chunk) = state.inbound.pop_front() {
                        return Ok(Some(chunk));
                    }
                    if !state.hang_when_drained {
                        return Ok(None);
                    }
                }

                futures::pending!();
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

    fn status(id: RequestId, code: u32) -> Vec<u8> {
        record(|writer| {
            writer.u8(proto::STATUS);
            writer.u32(id);
            writer.u32(code);
            writer.string(b"");
            writer.string(b"");
        })
    }

    async fn started(link: &ScriptedLink) -> SftpClient<ScriptedLink> {
        link.push(record(|writer| {
            writer.u8(proto::VERSION);
            writer.u32(3);
            writer.string(b"posix-rename@openssh.com");
            writer.string(b"1");
        }));

        SftpClient::start(link.clone(), None).await.expect("start")
    }

    #[async_std::test]
    async fn negotiation_collects_extensions() {
        let link = ScriptedLink::default();
        let client = started(&link).await;

        assert_eq!(client.version(), 3);
        assert_eq!(
            client.extensions().get("posix-rename@openssh.com"),
            Some(&b"1".to_vec())
        );
        // The INIT went out as `length || type || version`.
        assert_eq!(
            link.state.lock().expect("lock").sent[0],
            [0, 0, 0, 5, 1, 0, 0, 0, 3],
        );
    }

    #[async_std::test]
    async fn replies_route_by_id_in_any_order() {
        let link = ScriptedLink::default();
        let mut client = started(&link).await;

        let handle = Handle(b"h0".to_vec());

        // Eight pipelined writes at 32KiB strides.
        let mut ids = Vec::new();
        for index in 0..8u64 {
            let id = client
                .submit_write(&handle, index * 32 * 1024, &[0x61; 64])
                .await
                .expect("submit");

            ids.push(id);
        }
        assert_eq!(link.sent(), 1 + 8);

        // The server answers in reverse order.
        for &id in ids.iter().rev() {
            link.push(status(id, 0));
        }

        for &id in &ids {
            client.complete_write(id).await.expect("complete");
        }

        // A final close and stat complete the upload.
        link.push(status(8, 0));
        client.close(Handle(b"h0".to_vec())).await.expect("close");

        link.push(record(|writer| {
            writer.u8(proto::ATTRS);
            writer.u32(9);
            Attrs::with_size(262144).encode(writer);
        }));
        let attrs = client.stat("/data/upload").await.expect("stat");
        assert_eq!(attrs.size, Some(262144));
    }

    #[async_std::test]
    async fn each_reply_completes_exactly_one_request() {
        let link = ScriptedLink::default();
        let mut client = started(&link).await;

        let handle = Handle(b"h1".to_vec());
        let id = client.submit_read(&handle, 0, 1024).await.expect("submit");

        link.push(status(id, 0));
        // A duplicate reply for the same id is a protocol violation.
        link.push(status(id, 0));

        assert!(matches!(
            client.complete_read(id).await,
            Err(Error::BadMessage)
        ));
    }

    #[async_std::test]
    async fn eof_status_is_not_an_error_for_reads() {
        let link = ScriptedLink::default();
        let mut client = started(&link).await;

        let handle = Handle(b"h2".to_vec());

        let id = client.submit_read(&handle, 0, 1024).await.expect("submit");
        link.push(status(id, 1));

        assert_eq!(client.complete_read(id).await.expect("complete"), None);
    }

    #[async_std::test]
    async fn status_codes_map_to_errors() {
        let link = ScriptedLink::default();
        let mut client = started(&link).await;

        link.push(record(|writer| {
            writer.u8(proto::STATUS);
            writer.u32(0);
            writer.u32(2);
            writer.string(b"No such file");
            writer.string(b"");
        }));

        let err = client.remove("/missing").await.expect_err("must fail");

        match err {
            Error::Sftp { code, message } => {
                assert_eq!(code, StatusCode::NoSuchFile);
                assert_eq!(message, "No such file");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[async_std::test]
    async fn cancelled_requests_drop_their_late_reply() {
        let link = ScriptedLink::default();
        let mut client = started(&link).await;

        let handle = Handle(b"h3".to_vec());

        let cancelled = client.submit_read(&handle, 0, 512).await.expect("submit");
        client.cancel(cancelled);

        // The stale reply arrives anyway, then a live request's one.
        link.push(record(|writer| {
            writer.u8(proto::DATA);
            writer.u32(cancelled);
            writer.string(b"stale");
        }));

        let live = client.submit_read(&handle, 512, 512).await.expect("submit");
        link.push(record(|writer| {
            writer.u8(proto::DATA);
            writer.u32(live);
            writer.string(b"fresh");
        }));

        assert_eq!(
            client.complete_read(live).await.expect("complete"),
            Some(b"fresh".to_vec()),
        );
        assert!(matches!(
            client.complete_read(cancelled).await,
            Err(Error::Cancelled)
        ));
    }

    #[async_std::test]
    async fn deadlines_fail_the_request_and_clear_its_entry() {
        let link = ScriptedLink::default();
        link.state.lock().expect("lock").hang_when_drained = true;

        link.push(record(|writer| {
            writer.u8(proto::VERSION);
            writer.u32(3);
        }));
        let mut client = SftpClient::start(
            link.clone(),
            Some(std::time::Duration::from_millis(50)),
        )
        .await
        .expect("start");

        let handle = Handle(b"h4".to_vec());
        let id = client.submit_write(&handle, 0, &[0; 16]).await.expect("submit");

        assert!(matches!(
            client.complete_write(id).await,
            Err(Error::Timeout)
        ));
        // The table entry is gone, so a late completion is `Cancelled`.
        assert!(matches!(
            client.complete_write(id).await,
            Err(Error::Cancelled)
        ));
    }

    #[async_std::test]
    async fn teardown_fails_outstanding_requests() {
        let link = ScriptedLink::default();
        let mut client = started(&link).await;

        let handle = Handle(b"h5".to_vec());
        let id = client.submit_write(&handle, 0, &[0; 16]).await.expect("submit");

        // The link drains with no reply queued: the channel is gone.
        assert!(matches!(
            client.complete_write(id).await,
            Err(Error::ConnectionLost)
        ));
        // And the engine stays dead.
        assert!(matches!(
            client.submit_write(&handle, 0, &[0; 16]).await,
            Err(Error::ConnectionLost)
        ));
    }
}
