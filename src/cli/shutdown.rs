use tokio::select;
use tokio_util::sync::CancellationToken;

/// Cancels `cancelation` once Ctrl-C is received. Returns early if the token is cancelled by
/// someone else.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => {},
    };
}
