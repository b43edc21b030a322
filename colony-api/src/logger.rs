use std::any::Any;
use std::fmt;

/// Text logging sink for worker diagnostics.
///
/// The pool decides where messages go; the default in `colony` forwards them
/// to `tracing`.
pub trait Logger: Send + Sync {
    /// Writes one formatted message.
    fn log(&self, args: fmt::Arguments<'_>);
}

/// Renders a panic payload as text.
///
/// Panics raised with `panic!("...")` carry a `&'static str` or a `String`;
/// anything else is reported by its opaque type.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct VecLogger {
        lines: Mutex<Vec<String>>,
    }

    impl Logger for VecLogger {
        fn log(&self, args: fmt::Arguments<'_>) {
            self.lines.lock().unwrap().push(args.to_string());
        }
    }

    #[test]
    fn test_panic_message_variants() {
        let literal: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(&*literal), "static message");

        let owned: Box<dyn Any + Send> = Box::new(format!("owned {}", 7));
        assert_eq!(panic_message(&*owned), "owned 7");

        let opaque: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(&*opaque), "Box<dyn Any>");
    }

    #[test]
    fn test_logger_receives_formatted_arguments() {
        let logger = VecLogger::default();
        logger.log(format_args!("worker {} exited", "w-1"));
        assert_eq!(logger.lines.lock().unwrap().as_slice(), ["worker w-1 exited"]);
    }
}
