//! コンソール通知

use lucid_common::{Notifier, Toast, ToastVariant};
use tracing::debug;

/// 通知を標準出力に表示
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, toast: Toast) {
        debug!(title = %toast.title, variant = ?toast.variant, "notification");
        let mark = match toast.variant {
            ToastVariant::Default => "✔",
            ToastVariant::Destructive => "✖",
        };
        println!("{} {}: {}", mark, toast.title, toast.description);
    }
}
