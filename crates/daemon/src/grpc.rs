// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C6: the two gRPC services, thin adapters over [`crate::dispatcher`] and
//! [`crate::admin`]. Message conversion lives here; business logic doesn't.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use tessera_core::CancelReason;
use tessera_wire::{CacheStatus, EngineOp, EngineReply, Info, RequestKind};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tonic::{Request, Response, Status};

use crate::admin::AdminPlane as AdminLogic;
use crate::child_host::ReplyFrame;
use crate::error::DispatchError;
use crate::proto;
use crate::state::DaemonState;

type BoxStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

fn decode_headers(bytes: &[u8]) -> Result<BTreeMap<String, String>, Status> {
    if bytes.is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_slice(bytes).map_err(|e| Status::invalid_argument(format!("invalid headers_json: {e}")))
}

fn status_str(status: CacheStatus) -> String {
    match status {
        CacheStatus::Unknown => "unknown",
        CacheStatus::New => "new",
        CacheStatus::NeedUpdate => "need_update",
        CacheStatus::Unchanged => "unchanged",
        CacheStatus::Removed => "removed",
        CacheStatus::NotFound => "not_found",
    }
    .to_string()
}

fn info_to_child_info(child_id: usize, uri_hint: &str, result: Result<Info, String>) -> proto::ChildInfo {
    match result {
        Ok(info) => proto::ChildInfo {
            child_id: child_id as u32,
            uri: info.uri,
            status: status_str(info.status),
            in_cache: info.in_cache,
            pinned: info.pinned,
            hits: info.hits,
            load_timestamp_ms: info.load_timestamp_ms,
            last_modified: info.last_modified,
            error: None,
        },
        Err(e) => proto::ChildInfo {
            child_id: child_id as u32,
            uri: uri_hint.to_string(),
            status: status_str(CacheStatus::Unknown),
            in_cache: false,
            pinned: false,
            hits: 0,
            load_timestamp_ms: None,
            last_modified: None,
            error: Some(e),
        },
    }
}

fn stream_of<T: Send + 'static>(items: Vec<T>) -> BoxStream<T> {
    Box::pin(tokio_stream::iter(items.into_iter().map(Ok)))
}

/// The `DataPlane` service: every RPC funnels through
/// [`crate::dispatcher::Dispatcher::dispatch`], the same path whether the
/// call is a liveness `Ping` or a real request, so dispatcher-level stats
/// (`active_workers`, `activity`) reflect every call this service makes.
pub struct DataPlaneService {
    state: Arc<DaemonState>,
}

impl DataPlaneService {
    pub fn new(state: Arc<DaemonState>) -> Self {
        Self { state }
    }

    fn reject_if_draining(&self) -> Result<(), Status> {
        if self.state.is_shutting_down() {
            return Err(Status::unavailable("daemon is draining for shutdown"));
        }
        Ok(())
    }

    /// Dispatch one request and collect its single reply chunk, for the
    /// non-streaming RPCs (`Ping`, `Collections`).
    async fn dispatch_one(&self, kind: RequestKind, op: EngineOp) -> Result<EngineReply, Status> {
        self.reject_if_draining()?;
        let encoded = tessera_wire::encode(&op).map_err(|e| Status::internal(e.to_string()))?;
        let timeout = self.state.config.read().server.timeout();
        let cancel = self.state.global_cancel.child();
        let mut rx = self
            .state
            .dispatcher
            .dispatch(kind, BTreeMap::new(), vec![encoded], timeout, cancel)
            .await
            .map_err(DispatchError::into_status)?;

        let mut last_chunk: Option<Vec<u8>> = None;
        while let Some(frame) = rx.recv().await {
            match frame {
                ReplyFrame::Headers { .. } => {}
                ReplyFrame::Chunk(bytes) => last_chunk = Some(bytes),
                ReplyFrame::End { ok, error, timed_out } => {
                    if !ok {
                        let message = error.unwrap_or_else(|| "request failed".to_string());
                        return Err(if timed_out { Status::deadline_exceeded(message) } else { Status::internal(message) });
                    }
                    break;
                }
            }
        }
        let bytes = last_chunk.ok_or_else(|| Status::internal("child returned no reply"))?;
        tessera_wire::decode(&bytes).map_err(|e| Status::internal(e.to_string()))
    }

    /// Dispatch one request and forward every reply frame as a streamed
    /// proto `ReplyFrame`, for `ExecuteOwsRequest`/`ExecuteApiRequest`. The
    /// child's single `EngineReply::Opaque` chunk carries the real headers
    /// and body; the wire-level `ReplyFrame::Headers` ahead of it is just
    /// transport framing and is discarded here.
    async fn dispatch_stream(
        &self,
        kind: RequestKind,
        req: proto::EngineRequest,
    ) -> Result<Response<BoxStream<proto::ReplyFrame>>, Status> {
        self.reject_if_draining()?;
        let headers = decode_headers(&req.headers_json)?;
        let op = EngineOp::Opaque { headers, body: req.body };
        let encoded = tessera_wire::encode(&op).map_err(|e| Status::internal(e.to_string()))?;
        let timeout = self.state.config.read().server.timeout();
        let cancel = self.state.global_cancel.child();
        let mut inner_rx = self
            .state
            .dispatcher
            .dispatch(kind, BTreeMap::new(), vec![encoded], timeout, cancel.clone())
            .await
            .map_err(DispatchError::into_status)?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(frame) = inner_rx.recv().await {
                match frame {
                    ReplyFrame::Headers { .. } => {}
                    ReplyFrame::Chunk(bytes) => {
                        let reply: EngineReply = match tessera_wire::decode(&bytes) {
                            Ok(r) => r,
                            Err(e) => {
                                let _ = tx.send(Err(Status::internal(e.to_string())));
                                return;
                            }
                        };
                        let EngineReply::Opaque { headers, body } = reply else {
                            let _ = tx.send(Err(Status::internal("unexpected engine reply for a streaming request")));
                            return;
                        };
                        let headers_msg = proto::ReplyFrame {
                            body: Some(proto::reply_frame::Body::Headers(proto::ReplyHeadersMsg {
                                status: 200,
                                headers,
                            })),
                        };
                        if tx.send(Ok(headers_msg)).is_err() {
                            cancel.cancel(CancelReason::CallerAbort);
                            return;
                        }
                        let chunk_msg = proto::ReplyFrame { body: Some(proto::reply_frame::Body::Chunk(body)) };
                        if tx.send(Ok(chunk_msg)).is_err() {
                            cancel.cancel(CancelReason::CallerAbort);
                            return;
                        }
                    }
                    ReplyFrame::End { ok, error, timed_out } => {
                        if !ok {
                            let message = error.unwrap_or_else(|| "request failed".to_string());
                            let status = if timed_out { Status::deadline_exceeded(message) } else { Status::internal(message) };
                            let _ = tx.send(Err(status));
                        }
                        return;
                    }
                }
            }
        });

        Ok(Response::new(Box::pin(UnboundedReceiverStream::new(rx))))
    }
}

#[derive(Serialize)]
struct CollectionsParams {
    location: Option<String>,
    resource: Option<String>,
    range: Option<String>,
}

#[tonic::async_trait]
impl proto::data_plane_server::DataPlane for DataPlaneService {
    type ExecuteOwsRequestStream = BoxStream<proto::ReplyFrame>;
    type ExecuteApiRequestStream = BoxStream<proto::ReplyFrame>;

    async fn ping(&self, request: Request<proto::PingRequest>) -> Result<Response<proto::PingReply>, Status> {
        let echo = request.into_inner().echo;
        match self.dispatch_one(RequestKind::Api, EngineOp::Ping { echo }).await? {
            EngineReply::Ping { echo } => Ok(Response::new(proto::PingReply { echo })),
            _ => Err(Status::internal("unexpected engine reply to Ping")),
        }
    }

    async fn execute_ows_request(
        &self,
        request: Request<proto::EngineRequest>,
    ) -> Result<Response<Self::ExecuteOwsRequestStream>, Status> {
        self.dispatch_stream(RequestKind::OwsOgc, request.into_inner()).await
    }

    async fn execute_api_request(
        &self,
        request: Request<proto::EngineRequest>,
    ) -> Result<Response<Self::ExecuteApiRequestStream>, Status> {
        self.dispatch_stream(RequestKind::Api, request.into_inner()).await
    }

    async fn collections(
        &self,
        request: Request<proto::CollectionsRequest>,
    ) -> Result<Response<proto::CollectionsPage>, Status> {
        let req = request.into_inner();
        let params = CollectionsParams { location: req.location, resource: req.resource, range: req.range };
        let body = serde_json::to_vec(&params).map_err(|e| Status::internal(e.to_string()))?;
        let op = EngineOp::Opaque { headers: BTreeMap::new(), body };
        match self.dispatch_one(RequestKind::Collections, op).await? {
            EngineReply::Opaque { body, .. } => Ok(Response::new(proto::CollectionsPage { items: vec![body], next: None })),
            _ => Err(Status::internal("unexpected engine reply to Collections")),
        }
    }
}

/// The `AdminPlane` gRPC service: a thin wrapper translating
/// [`crate::admin::AdminPlane`]'s business-logic results into proto
/// messages and streams. Holds the logic struct by value since it's itself
/// just an `Arc<DaemonState>` plus a `ReloadHandle`.
pub struct AdminPlaneService {
    logic: AdminLogic,
}

impl AdminPlaneService {
    pub fn new(logic: AdminLogic) -> Self {
        Self { logic }
    }
}

#[tonic::async_trait]
impl proto::admin_plane_server::AdminPlane for AdminPlaneService {
    type CheckoutProjectStream = BoxStream<proto::ChildInfo>;
    type DropProjectStream = BoxStream<proto::ChildInfo>;
    type ListCacheStream = BoxStream<proto::ChildInfo>;
    type UpdateCacheStream = BoxStream<proto::ChildUpdateResult>;
    type ListPluginsStream = BoxStream<proto::Plugin>;
    type GetProjectInfoStream = BoxStream<proto::ChildProjectInfo>;
    type CatalogStream = BoxStream<proto::CatalogItem>;
    type DumpCacheStream = BoxStream<proto::ChildCacheDump>;

    async fn checkout_project(
        &self,
        request: Request<proto::CheckoutRequest>,
    ) -> Result<Response<Self::CheckoutProjectStream>, Status> {
        let req = request.into_inner();
        let outcomes = self.logic.checkout_project(&req.uri, req.pull).await;
        let items = outcomes
            .into_iter()
            .map(|(id, result)| info_to_child_info(id, &req.uri, result))
            .collect();
        Ok(Response::new(stream_of(items)))
    }

    async fn drop_project(&self, request: Request<proto::UriRequest>) -> Result<Response<Self::DropProjectStream>, Status> {
        let req = request.into_inner();
        let outcomes = self.logic.drop_project(&req.uri).await;
        let items = outcomes
            .into_iter()
            .map(|(id, result)| info_to_child_info(id, &req.uri, result))
            .collect();
        Ok(Response::new(stream_of(items)))
    }

    async fn list_cache(&self, _request: Request<proto::Empty>) -> Result<Response<Self::ListCacheStream>, Status> {
        let outcomes = self.logic.list_cache().await;
        let items = outcomes
            .into_iter()
            .flat_map(|(id, result)| match result {
                Ok(infos) => infos.into_iter().map(|i| info_to_child_info(id, &i.uri.clone(), Ok(i))).collect(),
                Err(e) => vec![info_to_child_info(id, "", Err(e))],
            })
            .collect();
        Ok(Response::new(stream_of(items)))
    }

    async fn clear_cache(&self, _request: Request<proto::Empty>) -> Result<Response<proto::BroadcastAck>, Status> {
        let (acked, failed) = self.logic.clear_cache().await;
        Ok(Response::new(proto::BroadcastAck { children_acked: acked, children_failed: failed }))
    }

    async fn update_cache(&self, _request: Request<proto::Empty>) -> Result<Response<Self::UpdateCacheStream>, Status> {
        let matrix = self.logic.update_cache().await;
        let items = matrix
            .into_iter()
            .map(|(child_id, uri, status)| proto::ChildUpdateResult {
                child_id: child_id as u32,
                uri,
                status: status_str(status),
            })
            .collect();
        Ok(Response::new(stream_of(items)))
    }

    async fn list_plugins(&self, _request: Request<proto::Empty>) -> Result<Response<Self::ListPluginsStream>, Status> {
        let items = self.logic.list_plugins().into_iter().map(|scheme| proto::Plugin { scheme }).collect();
        Ok(Response::new(stream_of(items)))
    }

    async fn get_config(&self, _request: Request<proto::Empty>) -> Result<Response<proto::ConfigReply>, Status> {
        let toml_text = self.logic.get_config().map_err(|e| Status::internal(e.to_string()))?;
        Ok(Response::new(proto::ConfigReply { config_toml: toml_text.into_bytes() }))
    }

    async fn set_config(
        &self,
        request: Request<proto::ConfigPatchRequest>,
    ) -> Result<Response<proto::ConfigDiffReply>, Status> {
        let req = request.into_inner();
        let patch_json: serde_json::Value =
            serde_json::from_slice(&req.patch_json).map_err(|e| Status::invalid_argument(e.to_string()))?;
        let (fields, reload_required) = self
            .logic
            .set_config(patch_json)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        let fields = fields
            .into_iter()
            .map(|f| proto::ConfigFieldMsg {
                path: f.path,
                tag: match f.tag {
                    tessera_core::config::FieldTag::Hot => "hot".to_string(),
                    tessera_core::config::FieldTag::Cold => "cold".to_string(),
                },
                old_json: serde_json::to_vec(&f.old).unwrap_or_default(),
                new_json: serde_json::to_vec(&f.new).unwrap_or_default(),
            })
            .collect();
        Ok(Response::new(proto::ConfigDiffReply { fields, reload_required }))
    }

    async fn get_project_info(
        &self,
        request: Request<proto::UriRequest>,
    ) -> Result<Response<Self::GetProjectInfoStream>, Status> {
        let req = request.into_inner();
        let outcomes = self.logic.project_info(&req.uri).await;
        let items = outcomes
            .into_iter()
            .map(|(child_id, result)| match result {
                Ok(info) => proto::ChildProjectInfo {
                    child_id: child_id as u32,
                    uri: info.uri,
                    layers: info.layers,
                    diagnostics: info.diagnostics,
                    error: None,
                },
                Err(e) => proto::ChildProjectInfo {
                    child_id: child_id as u32,
                    uri: req.uri.clone(),
                    layers: vec![],
                    diagnostics: vec![],
                    error: Some(e),
                },
            })
            .collect();
        Ok(Response::new(stream_of(items)))
    }

    async fn catalog(&self, request: Request<proto::CatalogRequest>) -> Result<Response<Self::CatalogStream>, Status> {
        let req = request.into_inner();
        let items = self
            .logic
            .catalog(req.location.as_deref())
            .await
            .into_iter()
            .map(|item| proto::CatalogItem { uri: item.uri, title: item.title })
            .collect();
        Ok(Response::new(stream_of(items)))
    }

    async fn get_env(&self, _request: Request<proto::Empty>) -> Result<Response<proto::EnvReply>, Status> {
        Ok(Response::new(proto::EnvReply { values: self.logic.get_env().into_iter().collect() }))
    }

    async fn set_server_serving_status(
        &self,
        request: Request<proto::ServingStatusRequest>,
    ) -> Result<Response<proto::Empty>, Status> {
        self.logic.set_serving_status(request.into_inner().serving).await;
        Ok(Response::new(proto::Empty {}))
    }

    async fn stats(&self, _request: Request<proto::Empty>) -> Result<Response<proto::StatsReply>, Status> {
        let stats = self.logic.stats();
        Ok(Response::new(proto::StatsReply {
            active_workers: stats.active_workers,
            idle_workers: stats.idle_workers,
            activity: stats.activity,
            failure_pressure: stats.failure_pressure,
            request_pressure: stats.request_pressure,
            uptime_secs: stats.uptime_secs,
        }))
    }

    async fn reload(&self, _request: Request<proto::Empty>) -> Result<Response<proto::ReloadReply>, Status> {
        let children_replaced = self.logic.reload().await as u32;
        Ok(Response::new(proto::ReloadReply { children_replaced }))
    }

    async fn dump_cache(&self, _request: Request<proto::Empty>) -> Result<Response<Self::DumpCacheStream>, Status> {
        let dump = self.logic.dump_cache().await;
        let items = dump
            .into_iter()
            .map(|(child_id, infos)| proto::ChildCacheDump {
                child_id: child_id as u32,
                entries: infos.into_iter().map(|i| info_to_child_info(child_id, &i.uri.clone(), Ok(i))).collect(),
            })
            .collect();
        Ok(Response::new(stream_of(items)))
    }
}
