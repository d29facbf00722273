//! WebSocket transport over tokio-tungstenite.
//!
//! Adapts a WebSocket stream to the [`Frame`] seam: text payloads map to
//! [`Frame::Message`], close frames to [`Frame::Close`], and ping/pong
//! control frames stay inside the WebSocket library.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{ready, Sink, Stream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use super::{Frame, TransportError};

/// Protocol version this client speaks.
pub const GATEWAY_VERSION: &str = "10";

/// Payload encoding this client speaks.
pub const GATEWAY_ENCODING: &str = "json";

/// Close code reported when the peer sent a close frame with no body.
const NO_STATUS: u16 = 1005;

/// A gateway connection over a (possibly TLS) WebSocket.
#[derive(Debug)]
pub struct WsTransport {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    /// Wrap an already established WebSocket stream.
    #[must_use]
    pub const fn from_stream(inner: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self { inner }
    }
}

/// Validate a gateway URL and normalize its query parameters.
///
/// The scheme must be `wss`; the protocol version and encoding are
/// appended when absent and rejected when present with unsupported
/// values.
///
/// # Errors
///
/// Returns [`TransportError::InvalidUrl`] on an unparsable URL, a
/// non-secure scheme, or unsupported version/encoding parameters.
pub fn validate_gateway_url(raw: &str) -> Result<Url, TransportError> {
    let mut url = Url::parse(raw).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

    if url.scheme() != "wss" {
        return Err(TransportError::InvalidUrl(format!(
            "scheme must be wss, got {}",
            url.scheme()
        )));
    }

    let mut has_version = false;
    let mut has_encoding = false;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "v" => {
                if value != GATEWAY_VERSION {
                    return Err(TransportError::InvalidUrl(format!(
                        "unsupported protocol version {value}"
                    )));
                }
                has_version = true;
            }
            "encoding" => {
                if value != GATEWAY_ENCODING {
                    return Err(TransportError::InvalidUrl(format!(
                        "unsupported encoding {value}"
                    )));
                }
                has_encoding = true;
            }
            _ => {}
        }
    }

    let mut pairs = url.query_pairs_mut();
    if !has_version {
        pairs.append_pair("v", GATEWAY_VERSION);
    }
    if !has_encoding {
        pairs.append_pair("encoding", GATEWAY_ENCODING);
    }
    drop(pairs);

    Ok(url)
}

/// Dial a gateway URL.
///
/// # Errors
///
/// Returns an error when the URL is rejected or the WebSocket handshake
/// fails.
pub async fn connect(url: &str) -> Result<WsTransport, TransportError> {
    let url = validate_gateway_url(url)?;
    let (stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
    debug!(url = %url, "gateway websocket connected");
    Ok(WsTransport::from_stream(stream))
}

impl Stream for WsTransport {
    type Item = Result<Frame, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let message = match ready!(Pin::new(&mut self.inner).poll_next(cx)) {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Poll::Ready(Some(Err(e.into()))),
                None => return Poll::Ready(None),
            };

            match message {
                Message::Text(text) => return Poll::Ready(Some(Ok(Frame::Message(text)))),
                Message::Binary(data) => match String::from_utf8(data) {
                    Ok(text) => return Poll::Ready(Some(Ok(Frame::Message(text)))),
                    Err(_) => {
                        debug!("dropping non-utf8 binary message");
                    }
                },
                Message::Close(frame) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((NO_STATUS, String::new()));
                    return Poll::Ready(Some(Ok(Frame::Close { code, reason })));
                }
                // Ping/pong and raw frames are the library's business.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }
}

impl Sink<Frame> for WsTransport {
    type Error = TransportError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_ready(cx).map_err(Into::into)
    }

    fn start_send(mut self: Pin<&mut Self>, frame: Frame) -> Result<(), Self::Error> {
        let message = match frame {
            Frame::Message(text) => Message::Text(text),
            Frame::Close { code, reason } => Message::Close(Some(CloseFrame {
                code: WsCloseCode::from(code),
                reason: reason.into(),
            })),
        };
        Pin::new(&mut self.inner)
            .start_send(message)
            .map_err(Into::into)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_flush(cx).map_err(Into::into)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_close(cx).map_err(Into::into)
    }
}
