//! Windows event source using IP Helper change notifications.
//!
//! Registers `NotifyIpInterfaceChange` and `NotifyRouteChange2` (both
//! families, with an initial notification) and converts the callback-based
//! API into a token stream. Callbacks run on threads owned by the system
//! DLL, so teardown follows a strict order: raise the stop flag, cancel both
//! registrations (which waits out in-flight callbacks), then reclaim the
//! callback contexts.

use crate::source::{ChangeReason, EventSource, OsEvent, SourceError, EVENT_CHANNEL_CAPACITY};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use windows::Win32::Foundation::{HANDLE, NO_ERROR, WIN32_ERROR};
use windows::Win32::NetworkManagement::IpHelper::{
    CancelMibChangeNotify2, NotifyIpInterfaceChange, NotifyRouteChange2, MIB_IPFORWARD_ROW2,
    MIB_IPINTERFACE_ROW, MIB_NOTIFICATION_TYPE,
};
use windows::Win32::Networking::WinSock::AF_UNSPEC;

/// Windows implementation of [`EventSource`] using IP Helper notifications.
///
/// # One-time Semantics
///
/// Once `into_stream` is called, the source is consumed. If the stream
/// yields an error, callers should treat this source as dead rather than
/// attempting to recreate it.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsEventSource {
    _private: (),
}

impl WindowsEventSource {
    /// Creates a new Windows event source.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl EventSource for WindowsEventSource {
    type Stream = WindowsEventStream;

    fn into_stream(self) -> Self::Stream {
        WindowsEventStream::new()
    }
}

/// Stream of change tokens from the IP Helper notification callbacks.
pub struct WindowsEventStream {
    receiver: mpsc::Receiver<Result<OsEvent, SourceError>>,
    /// Cancels both registrations and reclaims callback memory on drop.
    guard: Option<NotificationGuard>,
    /// Whether a fatal error has been yielded.
    terminated: bool,
}

impl std::fmt::Debug for WindowsEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowsEventStream")
            .field("terminated", &self.terminated)
            .field("has_guard", &self.guard.is_some())
            .finish_non_exhaustive()
    }
}

impl WindowsEventStream {
    /// Registers both notifications; a registration failure is delivered as
    /// the stream's first and only item.
    fn new() -> Self {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let guard = match register_notifications(&tx) {
            Ok(guard) => Some(guard),
            Err(e) => {
                let _ = tx.try_send(Err(e));
                None
            }
        };

        Self {
            receiver: rx,
            guard,
            terminated: false,
        }
    }
}

impl Stream for WindowsEventStream {
    type Item = Result<OsEvent, SourceError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.terminated {
            return Poll::Ready(None);
        }

        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(Ok(event))) => Poll::Ready(Some(Ok(event))),
            Poll::Ready(Some(Err(e))) => {
                self.terminated = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.terminated = true;
                if self.guard.is_some() {
                    // Registrations alive but every sender vanished.
                    Poll::Ready(Some(Err(SourceError::Stopped)))
                } else {
                    Poll::Ready(None)
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// RAII owner of the two notification registrations.
///
/// Drop order is load-bearing: the stop flag must be visible to callbacks
/// before cancellation starts, and the contexts may only be reclaimed after
/// `CancelMibChangeNotify2` has returned for both handles; Windows
/// guarantees no callback is running or will run after that point.
struct NotificationGuard {
    stopped: Arc<AtomicBool>,
    interface_handle: HANDLE,
    route_handle: HANDLE,
    interface_ctx: *mut CallbackContext,
    route_ctx: *mut CallbackContext,
}

impl Drop for NotificationGuard {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);

        // SAFETY: We own both handles; CancelMibChangeNotify2 is safe to
        // call once per handle and blocks until in-flight callbacks finish.
        let _ = unsafe { CancelMibChangeNotify2(self.interface_handle) };
        let _ = unsafe { CancelMibChangeNotify2(self.route_handle) };

        // SAFETY: After cancellation neither callback can fire again, so the
        // leaked contexts can be reclaimed. Dropping them drops the senders,
        // which closes the channel.
        drop(unsafe { Box::from_raw(self.interface_ctx) });
        drop(unsafe { Box::from_raw(self.route_ctx) });
    }
}

// SAFETY: The handles and context pointers are only touched from Drop, and
// the Windows API allows cancellation from any thread.
unsafe impl Send for NotificationGuard {}

/// Context handed to the system DLL for the lifetime of a registration.
struct CallbackContext {
    sender: mpsc::Sender<Result<OsEvent, SourceError>>,
    stopped: Arc<AtomicBool>,
    reason: ChangeReason,
}

/// Registers the interface-change and route-change notifications.
///
/// # Coverage Note
///
/// Excluded from coverage: requires the live IP Helper API.
#[cfg(not(tarpaulin_include))]
fn register_notifications(
    sender: &mpsc::Sender<Result<OsEvent, SourceError>>,
) -> Result<NotificationGuard, SourceError> {
    let stopped = Arc::new(AtomicBool::new(false));

    let interface_ctx = Box::into_raw(Box::new(CallbackContext {
        sender: sender.clone(),
        stopped: Arc::clone(&stopped),
        reason: ChangeReason::IpInterface,
    }));

    let interface_void = interface_ctx.cast::<std::ffi::c_void>();
    let mut interface_handle = HANDLE::default();
    // SAFETY: Valid callback and context; InitialNotification = true asks
    // for one callback at registration so consumers start from fresh state.
    let result = unsafe {
        NotifyIpInterfaceChange(
            AF_UNSPEC,
            Some(interface_change_callback),
            Some(interface_void),
            true,
            &raw mut interface_handle,
        )
    };
    if result != NO_ERROR {
        // SAFETY: Registration failed, so Windows won't call the callback.
        drop(unsafe { Box::from_raw(interface_ctx) });
        return Err(windows::core::Error::from(WIN32_ERROR(result.0)).into());
    }

    let route_ctx = Box::into_raw(Box::new(CallbackContext {
        sender: sender.clone(),
        stopped: Arc::clone(&stopped),
        reason: ChangeReason::Route,
    }));

    let route_void = route_ctx.cast::<std::ffi::c_void>();
    let mut route_handle = HANDLE::default();
    // SAFETY: As above, for the route table.
    let result = unsafe {
        NotifyRouteChange2(
            AF_UNSPEC,
            Some(route_change_callback),
            Some(route_void),
            true,
            &raw mut route_handle,
        )
    };
    if result != NO_ERROR {
        // SAFETY: The interface registration succeeded and must be unwound
        // before its context is reclaimed; the route registration never
        // took, so its context can be reclaimed directly.
        let _ = unsafe { CancelMibChangeNotify2(interface_handle) };
        drop(unsafe { Box::from_raw(interface_ctx) });
        drop(unsafe { Box::from_raw(route_ctx) });
        return Err(windows::core::Error::from(WIN32_ERROR(result.0)).into());
    }

    Ok(NotificationGuard {
        stopped,
        interface_handle,
        route_handle,
        interface_ctx,
        route_ctx,
    })
}

/// Forwards one token from a callback context.
///
/// # Safety
///
/// `caller_context` must be null or point to a live `CallbackContext`.
///
/// # Coverage Note
///
/// Excluded from coverage: only called by the system DLL.
#[cfg(not(tarpaulin_include))]
unsafe fn notify(caller_context: *const std::ffi::c_void) {
    if caller_context.is_null() {
        return;
    }
    // SAFETY: Set by register_notifications and reclaimed only after both
    // cancellations complete, so the pointer is valid for every invocation.
    let context = unsafe { &*(caller_context.cast::<CallbackContext>()) };

    // A raised stop flag means teardown has begun; late callbacks no-op.
    if context.stopped.load(Ordering::Acquire) {
        return;
    }

    // Non-blocking: callbacks run on DLL-owned threads and must not stall.
    // Dropped tokens are harmless downstream.
    let _ = context.sender.try_send(Ok(OsEvent::new(context.reason)));
}

/// Callback for `NotifyIpInterfaceChange`.
///
/// # Coverage Note
///
/// Excluded from coverage: only called by the system DLL.
#[cfg(not(tarpaulin_include))]
unsafe extern "system" fn interface_change_callback(
    caller_context: *const std::ffi::c_void,
    _row: *const MIB_IPINTERFACE_ROW,
    _notification_type: MIB_NOTIFICATION_TYPE,
) {
    // SAFETY: caller_context was installed by register_notifications.
    unsafe { notify(caller_context) }
}

/// Callback for `NotifyRouteChange2`.
///
/// # Coverage Note
///
/// Excluded from coverage: only called by the system DLL.
#[cfg(not(tarpaulin_include))]
unsafe extern "system" fn route_change_callback(
    caller_context: *const std::ffi::c_void,
    _row: *const MIB_IPFORWARD_ROW2,
    _notification_type: MIB_NOTIFICATION_TYPE,
) {
    // SAFETY: caller_context was installed by register_notifications.
    unsafe { notify(caller_context) }
}
