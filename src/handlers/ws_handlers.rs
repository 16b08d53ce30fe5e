use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse, web};
use actix_ws::Message;

use crate::auth::session::{get_permissions, get_user_id};
use crate::db::DbPool;
use crate::models::group;
use crate::notify;
use crate::realtime::WsHub;

/// Pump loop shared by both streams: forward hub pushes to the socket,
/// answer pings, stop on close or error. Client messages arrive via HTTP
/// POST, not over the socket.
async fn pump(
    mut ws_session: actix_ws::Session,
    mut msg_stream: actix_ws::MessageStream,
    mut rx: tokio::sync::mpsc::UnboundedReceiver<String>,
) {
    loop {
        tokio::select! {
            Some(msg) = rx.recv() => {
                if ws_session.text(msg).await.is_err() {
                    break;
                }
            }
            Some(Ok(msg)) = msg_stream.recv() => {
                match msg {
                    Message::Ping(bytes) => {
                        if ws_session.pong(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            else => break,
        }
    }
}

/// Per-user notification counter stream.
pub async fn notifications_connect(
    req: HttpRequest,
    body: web::Payload,
    session: Session,
    pool: web::Data<DbPool>,
    hub: web::Data<WsHub>,
) -> Result<HttpResponse, actix_web::Error> {
    let user_id = match get_user_id(&session) {
        Some(id) => id,
        None => return Ok(HttpResponse::Unauthorized().finish()),
    };

    let (response, ws_session, msg_stream) = actix_ws::handle(&req, body)?;
    let rx = hub.subscribe_user(user_id);

    // Send the current count up front so the client doesn't wait for the
    // next event.
    if let Ok(conn) = pool.get() {
        notify::push_unread_count(&conn, &hub, user_id);
    }

    actix_web::rt::spawn(pump(ws_session, msg_stream, rx));
    Ok(response)
}

/// Per-group topic proposal stream: every subscriber receives the full
/// current set list on connect and again after each workflow mutation.
pub async fn topics_connect(
    req: HttpRequest,
    body: web::Payload,
    session: Session,
    pool: web::Data<DbPool>,
    hub: web::Data<WsHub>,
    path: web::Path<i64>,
) -> Result<HttpResponse, actix_web::Error> {
    let group_id = path.into_inner();
    let user_id = match get_user_id(&session) {
        Some(id) => id,
        None => return Ok(HttpResponse::Unauthorized().finish()),
    };
    let permissions = get_permissions(&session).unwrap_or_default();

    let conn = pool.get().map_err(actix_web::error::ErrorInternalServerError)?;
    if group::require_access(&conn, group_id, user_id, &permissions).is_err() {
        return Ok(HttpResponse::Forbidden().finish());
    }

    let (response, ws_session, msg_stream) = actix_ws::handle(&req, body)?;
    let rx = hub.subscribe_group(group_id);

    if let Err(e) = notify::push_group_topics(&conn, &hub, group_id) {
        log::warn!("Initial topic snapshot push failed: {e}");
    }

    actix_web::rt::spawn(pump(ws_session, msg_stream, rx));
    Ok(response)
}
