//! gRPC entry points for both services.
//!
//! [`Dispatcher`] implements the generated [`CrudService`] and
//! [`StreamService`] traits. Every method converts the transport request into
//! an [`RpcCall`], wraps the matching handler in the [`InterceptorChain`] and
//! runs it once. Handlers never see `tonic` request types.
//!
//! ## Bidirectional calls
//!
//! The echo handler runs on its own task and writes into a bounded channel
//! whose receiver becomes the response stream. A failure of the call
//! (including an auth rejection) is delivered as the last item of that
//! stream. Dropping the response stream, which the transport does when the
//! client goes away, cancels the call.

use super::{crud::RecordStore, stream};
use crate::server::{
    config::ServerConfig,
    interceptor::{
        InterceptorChain,
        call::{CallContext, CallKind, RpcCall},
    },
    streaming::{Duplex, Inbound, Outbound},
};
use core::future::Future;
use core::pin::Pin;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use switchyard_core::proto::{
    crud::v1::{
        CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ReadRequest, ReadResponse,
        UpdateRequest, UpdateResponse, crud_service_server::CrudService,
    },
    stream::v1::{
        DirectMessageRequest, DirectMessageResponse, UploadFileRequest, UploadFileResponse,
        stream_service_server::StreamService,
    },
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status, Streaming};
use tower::{Layer, ServiceExt, service_fn};

/// Fully qualified gRPC paths, as logged by the interceptors.
pub mod procedures {
    pub const CREATE: &str = "/crud.v1.CrudService/Create";
    pub const READ: &str = "/crud.v1.CrudService/Read";
    pub const UPDATE: &str = "/crud.v1.CrudService/Update";
    pub const DELETE: &str = "/crud.v1.CrudService/Delete";
    pub const UPLOAD_FILE: &str = "/stream.v1.StreamService/UploadFile";
    pub const DIRECT_MESSAGE: &str = "/stream.v1.StreamService/DirectMessage";
}

pub type DirectMessageStream =
    Pin<Box<dyn Stream<Item = Result<DirectMessageResponse, Status>> + Send + 'static>>;

#[derive(Clone, Debug)]
pub struct Dispatcher {
    interceptors: InterceptorChain,
    store: Arc<RecordStore>,
    stream_buffer_size: usize,
}

impl Dispatcher {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            interceptors: InterceptorChain::new(config.auth.clone()),
            store: Arc::new(RecordStore::new()),
            stream_buffer_size: config.stream_buffer_size,
        }
    }

    /// Runs a unary handler through the interceptor chain.
    async fn unary<Req, Resp, F, Fut>(
        &self,
        procedure: &'static str,
        request: Request<Req>,
        mut handler: F,
    ) -> Result<Response<Resp>, Status>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        F: FnMut(Req) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = switchyard_core::Result<Resp>> + Send + 'static,
    {
        let context = CallContext::from_request(procedure, CallKind::Unary, &request);
        let call = RpcCall::new(context, request.into_inner());

        let service = self.interceptors.layer(service_fn(move |call: RpcCall<Req>| {
            let response = handler(call.message);
            async move { response.await.map_err(Status::from) }
        }));

        service.oneshot(call).await.map(Response::new)
    }

    /// Client-streaming upload over any source of request messages.
    pub async fn upload_file_from<S>(
        &self,
        metadata: MetadataMap,
        messages: S,
    ) -> Result<UploadFileResponse, Status>
    where
        S: Stream<Item = Result<UploadFileRequest, Status>> + Send + 'static,
    {
        self.upload_file_with(metadata, messages, stream::upload_file)
            .await
    }

    /// Runs `handler` over the inbound half of an upload, through the chain.
    pub(crate) async fn upload_file_with<S, H, Fut>(
        &self,
        metadata: MetadataMap,
        messages: S,
        mut handler: H,
    ) -> Result<UploadFileResponse, Status>
    where
        S: Stream<Item = Result<UploadFileRequest, Status>> + Send + 'static,
        H: FnMut(Inbound<UploadFileRequest>) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = switchyard_core::Result<UploadFileResponse>> + Send + 'static,
    {
        let context = CallContext::new(procedures::UPLOAD_FILE, CallKind::ClientStream, metadata);
        let inbound = Inbound::new(messages, &context);

        let service = self.interceptors.layer(service_fn(
            move |call: RpcCall<Inbound<UploadFileRequest>>| {
                let response = handler(call.message);
                async move { response.await.map_err(Status::from) }
            },
        ));

        service.oneshot(RpcCall::new(context, inbound)).await
    }

    /// Bidirectional echo over any source of request messages.
    pub fn direct_message_from<S>(&self, metadata: MetadataMap, messages: S) -> DirectMessageStream
    where
        S: Stream<Item = Result<DirectMessageRequest, Status>> + Send + 'static,
    {
        self.direct_message_with(metadata, messages, stream::direct_message)
    }

    /// Runs `handler` over both halves of a bidirectional call on its own
    /// task. The returned stream yields whatever the handler sends, then the
    /// call's error, if any, as the last item.
    pub(crate) fn direct_message_with<S, H, Fut>(
        &self,
        metadata: MetadataMap,
        messages: S,
        mut handler: H,
    ) -> DirectMessageStream
    where
        S: Stream<Item = Result<DirectMessageRequest, Status>> + Send + 'static,
        H: FnMut(Duplex<DirectMessageRequest, DirectMessageResponse>) -> Fut
            + Clone
            + Send
            + 'static,
        Fut: Future<Output = switchyard_core::Result<()>> + Send + 'static,
    {
        let context = CallContext::new(procedures::DIRECT_MESSAGE, CallKind::BidiStream, metadata);
        let (tx, rx) = mpsc::channel(self.stream_buffer_size);
        let duplex = Duplex {
            inbound: Inbound::new(messages, &context),
            outbound: Outbound::new(tx.clone(), &context),
        };
        let on_drop = context.cancellation().clone().drop_guard();

        let service = self.interceptors.layer(service_fn(
            move |call: RpcCall<Duplex<DirectMessageRequest, DirectMessageResponse>>| {
                let response = handler(call.message);
                async move { response.await.map_err(Status::from) }
            },
        ));

        tokio::spawn(async move {
            if let Err(status) = service.oneshot(RpcCall::new(context, duplex)).await {
                // Fails only if the client is already gone.
                let _ = tx.send(Err(status)).await;
            }
        });

        let responses = ReceiverStream::new(rx).map(move |response| {
            let _cancel_on_drop = &on_drop;
            response
        });
        Box::pin(responses)
    }
}

#[tonic::async_trait]
impl CrudService for Dispatcher {
    async fn create(
        &self,
        request: Request<CreateRequest>,
    ) -> Result<Response<CreateResponse>, Status> {
        let store = Arc::clone(&self.store);
        self.unary(procedures::CREATE, request, move |req: CreateRequest| {
            let store = Arc::clone(&store);
            async move { store.create(req.name).await.map(|id| CreateResponse { id }) }
        })
        .await
    }

    async fn read(&self, request: Request<ReadRequest>) -> Result<Response<ReadResponse>, Status> {
        let store = Arc::clone(&self.store);
        self.unary(procedures::READ, request, move |req: ReadRequest| {
            let store = Arc::clone(&store);
            async move {
                store.read(&req.id).await.map(|record| ReadResponse {
                    id: record.id,
                    name: record.name,
                })
            }
        })
        .await
    }

    async fn update(
        &self,
        request: Request<UpdateRequest>,
    ) -> Result<Response<UpdateResponse>, Status> {
        let store = Arc::clone(&self.store);
        self.unary(procedures::UPDATE, request, move |req: UpdateRequest| {
            let store = Arc::clone(&store);
            async move {
                store
                    .update(&req.id, req.updated_name)
                    .await
                    .map(|record| UpdateResponse {
                        id: record.id,
                        name: record.name,
                    })
            }
        })
        .await
    }

    async fn delete(
        &self,
        request: Request<DeleteRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let store = Arc::clone(&self.store);
        self.unary(procedures::DELETE, request, move |req: DeleteRequest| {
            let store = Arc::clone(&store);
            async move { store.delete(&req.id).await.map(|id| DeleteResponse { id }) }
        })
        .await
    }
}

#[tonic::async_trait]
impl StreamService for Dispatcher {
    type DirectMessageStream = DirectMessageStream;

    async fn upload_file(
        &self,
        request: Request<Streaming<UploadFileRequest>>,
    ) -> Result<Response<UploadFileResponse>, Status> {
        let (metadata, _, messages) = request.into_parts();
        self.upload_file_from(metadata, messages)
            .await
            .map(Response::new)
    }

    async fn direct_message(
        &self,
        request: Request<Streaming<DirectMessageRequest>>,
    ) -> Result<Response<Self::DirectMessageStream>, Status> {
        let (metadata, _, messages) = request.into_parts();
        Ok(Response::new(self.direct_message_from(metadata, messages)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::config::{AuthConfig, Environment};
    use crate::server::interceptor::recovery::PANIC_MESSAGE;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use switchyard_core::proto::crud::v1::crud_service_client::CrudServiceClient;
    use switchyard_core::proto::crud::v1::crud_service_server::CrudServiceServer;
    use switchyard_core::proto::stream::v1::stream_service_client::StreamServiceClient;
    use switchyard_core::proto::stream::v1::stream_service_server::StreamServiceServer;
    use tokio::net::TcpListener;
    use tokio_stream::wrappers::TcpListenerStream;
    use tonic::Code;
    use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};
    use tonic::transport::Server;

    const HEADER: &str = "x-auth-token";
    const SECRET: &str = "s3cr3t";

    fn config() -> ServerConfig {
        ServerConfig {
            server_addr: "127.0.0.1:0".into(),
            uds: false,
            environment: Environment::Development,
            stream_buffer_size: 2,
            auth: AuthConfig {
                header: AsciiMetadataKey::from_static(HEADER),
                secret: AsciiMetadataValue::from_static(SECRET),
            },
        }
    }

    fn authorized<T>(message: T) -> Request<T> {
        let mut request = Request::new(message);
        request
            .metadata_mut()
            .insert(HEADER, AsciiMetadataValue::from_static(SECRET));
        request
    }

    fn authorized_metadata() -> MetadataMap {
        let mut metadata = MetadataMap::new();
        metadata.insert(HEADER, AsciiMetadataValue::from_static(SECRET));
        metadata
    }

    #[tokio::test]
    async fn crud_lifecycle() {
        let dispatcher = Dispatcher::new(&config());

        let id = dispatcher
            .create(authorized(CreateRequest { name: "alice".into() }))
            .await
            .unwrap()
            .into_inner()
            .id;

        let read = dispatcher
            .read(authorized(ReadRequest { id: id.clone() }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!((read.id.as_str(), read.name.as_str()), (id.as_str(), "alice"));

        let updated = dispatcher
            .update(authorized(UpdateRequest {
                id: id.clone(),
                updated_name: "bob".into(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(updated.name, "bob");

        let deleted = dispatcher
            .delete(authorized(DeleteRequest { id: id.clone() }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(deleted.id, id);

        let status = dispatcher
            .read(authorized(ReadRequest { id }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "record not found");
    }

    #[tokio::test]
    async fn unauthenticated_create_stores_nothing() {
        let dispatcher = Dispatcher::new(&config());

        let status = dispatcher
            .create(Request::new(CreateRequest { name: "mallory".into() }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);
        assert_eq!(dispatcher.store.count().await, 0);
    }

    #[tokio::test]
    async fn panicking_update_leaves_store_unchanged() {
        let dispatcher = Dispatcher::new(&config());
        let store = Arc::clone(&dispatcher.store);
        let id = store.create("alice".into()).await.unwrap();

        let request = authorized(UpdateRequest {
            id: id.clone(),
            updated_name: "bob".into(),
        });
        let status = dispatcher
            .unary(procedures::UPDATE, request, move |req: UpdateRequest| {
                let store = Arc::clone(&store);
                async move {
                    store
                        .replace_with(&req.id, |current: &str| -> String {
                            panic!("cannot rename {current} to {}", req.updated_name)
                        })
                        .await
                        .map(|record| UpdateResponse {
                            id: record.id,
                            name: record.name,
                        })
                }
            })
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), PANIC_MESSAGE);

        let record = dispatcher.store.read(&id).await.unwrap();
        assert_eq!(record.name, "alice");
        assert_eq!(dispatcher.store.count().await, 1);

        // The write lock was released by the unwind.
        let updated = dispatcher
            .update(authorized(UpdateRequest {
                id: id.clone(),
                updated_name: "bob".into(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(updated.name, "bob");
    }

    async fn echo_twice_then_panic(
        duplex: Duplex<DirectMessageRequest, DirectMessageResponse>,
    ) -> switchyard_core::Result<()> {
        let Duplex {
            mut inbound,
            outbound,
        } = duplex;
        for _ in 0..2 {
            if let Some(request) = inbound.recv().await? {
                outbound
                    .send(DirectMessageResponse {
                        message: stream::echo(&request.message),
                    })
                    .await?;
            }
        }
        panic!("echo handler failed mid-stream");
    }

    async fn drain_then_panic(
        mut inbound: Inbound<UploadFileRequest>,
    ) -> switchyard_core::Result<UploadFileResponse> {
        while inbound.recv().await?.is_some() {}
        panic!("upload handler failed after end of input");
    }

    fn greetings() -> impl Stream<Item = Result<DirectMessageRequest, Status>> + Send + 'static {
        let requests = ["Hello", "Bye", "Again"].map(|message| {
            Ok::<_, Status>(DirectMessageRequest {
                message: message.into(),
            })
        });
        futures::stream::iter(requests)
    }

    #[tokio::test]
    async fn panicking_direct_message_ends_with_one_internal_status() {
        let dispatcher = Dispatcher::new(&config());

        let items: Vec<_> = dispatcher
            .direct_message_with(authorized_metadata(), greetings(), echo_twice_then_panic)
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().message, "Received message: Hello");
        assert_eq!(items[1].as_ref().unwrap().message, "Received message: Bye");
        let status = items[2].as_ref().unwrap_err();
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), PANIC_MESSAGE);
    }

    #[tokio::test]
    async fn direct_message_keeps_serving_after_a_panic() {
        let dispatcher = Dispatcher::new(&config());
        let _: Vec<_> = dispatcher
            .direct_message_with(authorized_metadata(), greetings(), echo_twice_then_panic)
            .collect()
            .await;

        let replies: Vec<_> = dispatcher
            .direct_message_from(authorized_metadata(), greetings())
            .collect()
            .await;
        assert_eq!(replies.len(), 3);
        assert!(replies.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn panicking_upload_returns_internal() {
        let dispatcher = Dispatcher::new(&config());
        let messages = futures::stream::iter(vec![Ok(UploadFileRequest {
            file_name: Some("a.txt".into()),
            chunk: "data".into(),
        })]);

        let status = dispatcher
            .upload_file_with(authorized_metadata(), messages, drain_then_panic)
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), PANIC_MESSAGE);
    }

    #[tokio::test]
    async fn unauthenticated_upload_never_consumes_the_stream() {
        let dispatcher = Dispatcher::new(&config());
        let consumed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&consumed);
        let messages = futures::stream::iter(vec![Ok(UploadFileRequest {
            file_name: Some("a.txt".into()),
            chunk: "data".into(),
        })])
        .inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let status = dispatcher
            .upload_file_from(MetadataMap::new(), messages)
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);
        assert_eq!(consumed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn authorized_upload_accumulates() {
        let dispatcher = Dispatcher::new(&config());
        let messages = futures::stream::iter(vec![
            Ok(UploadFileRequest {
                file_name: Some("a.txt".into()),
                chunk: "He".into(),
            }),
            Ok(UploadFileRequest {
                file_name: None,
                chunk: "llo".into(),
            }),
        ]);

        let response = dispatcher
            .upload_file_from(authorized_metadata(), messages)
            .await
            .unwrap();
        assert_eq!(response.file_name, "a.txt");
        assert_eq!(response.size, 5);
    }

    #[tokio::test]
    async fn unauthenticated_direct_message_ends_with_status() {
        let dispatcher = Dispatcher::new(&config());
        let messages = futures::stream::iter(vec![Ok(DirectMessageRequest {
            message: "Hello".into(),
        })]);

        let items: Vec<_> = dispatcher
            .direct_message_from(MetadataMap::new(), messages)
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap_err().code(), Code::Unauthenticated);
    }

    #[tokio::test]
    async fn direct_message_echoes_in_order_past_the_buffer() {
        let dispatcher = Dispatcher::new(&config());
        let words: Vec<String> = (0..10).map(|i| format!("word-{i}")).collect();
        let messages = futures::stream::iter(
            words
                .iter()
                .cloned()
                .map(|message| Ok(DirectMessageRequest { message }))
                .collect::<Vec<_>>(),
        );

        let replies: Vec<String> = dispatcher
            .direct_message_from(authorized_metadata(), messages)
            .map(|item| item.unwrap().message)
            .collect()
            .await;

        let expected: Vec<String> = words.iter().map(|w| stream::echo(w)).collect();
        assert_eq!(replies, expected);
    }

    #[tokio::test]
    async fn dropping_the_response_stream_cancels_the_call() {
        let dispatcher = Dispatcher::new(&config());
        let (tx, rx) = mpsc::channel::<Result<DirectMessageRequest, Status>>(1);

        let mut responses =
            dispatcher.direct_message_from(authorized_metadata(), ReceiverStream::new(rx));
        tx.send(Ok(DirectMessageRequest {
            message: "Hello".into(),
        }))
        .await
        .unwrap();
        assert_eq!(
            responses.next().await.unwrap().unwrap().message,
            "Received message: Hello"
        );

        // The handler is now parked on the next receive. Dropping the
        // response side must release it, which drops its inbound half.
        drop(responses);
        tokio::time::timeout(core::time::Duration::from_secs(5), tx.closed())
            .await
            .unwrap();
    }

    async fn spawn_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let dispatcher = Dispatcher::new(&config());

        tokio::spawn(
            Server::builder()
                .add_service(CrudServiceServer::new(dispatcher.clone()))
                .add_service(StreamServiceServer::new(dispatcher))
                .serve_with_incoming(TcpListenerStream::new(listener)),
        );
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn end_to_end_over_loopback() {
        let url = spawn_server().await;
        let mut crud = CrudServiceClient::connect(url.clone()).await.unwrap();
        let mut streams = StreamServiceClient::connect(url).await.unwrap();

        // Unary, unauthenticated.
        let status = crud
            .create(CreateRequest { name: "alice".into() })
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);

        // Unary, authorized.
        let id = crud
            .create(authorized(CreateRequest { name: "alice".into() }))
            .await
            .unwrap()
            .into_inner()
            .id;
        let read = crud
            .read(authorized(ReadRequest { id: id.clone() }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(read.name, "alice");

        let status = crud
            .delete(authorized(DeleteRequest { id: "missing".into() }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);

        // Client streaming.
        let upload = streams
            .upload_file(authorized(tokio_stream::iter(vec![
                UploadFileRequest {
                    file_name: None,
                    chunk: "x".into(),
                },
                UploadFileRequest {
                    file_name: Some("b.txt".into()),
                    chunk: "yz".into(),
                },
                UploadFileRequest {
                    file_name: Some("c.txt".into()),
                    chunk: "!".into(),
                },
            ])))
            .await
            .unwrap()
            .into_inner();
        assert_eq!((upload.file_name.as_str(), upload.size), ("b.txt", 4));

        // Bidirectional streaming.
        let mut replies = streams
            .direct_message(authorized(tokio_stream::iter(vec![
                DirectMessageRequest {
                    message: "Hello".into(),
                },
                DirectMessageRequest {
                    message: "Bye".into(),
                },
            ])))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(
            replies.message().await.unwrap().unwrap().message,
            "Received message: Hello"
        );
        assert_eq!(
            replies.message().await.unwrap().unwrap().message,
            "Received message: Bye"
        );
        assert!(replies.message().await.unwrap().is_none());

        // Bidirectional streaming, unauthenticated.
        let outcome = streams
            .direct_message(tokio_stream::iter(vec![DirectMessageRequest {
                message: "Hello".into(),
            }]))
            .await;
        let code = match outcome {
            Err(status) => status.code(),
            Ok(response) => response.into_inner().message().await.unwrap_err().code(),
        };
        assert_eq!(code, Code::Unauthenticated);
    }
}
