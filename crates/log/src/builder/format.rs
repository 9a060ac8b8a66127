//! Format layer creation macros

/// Build a human-readable fmt layer (`pretty` or `compact`) with the shared
/// display options and timestamp layout.
macro_rules! create_fmt_layer {
    ($format:ident, $display:expr, $writer:expr) => {{
        let layer = tracing_subscriber::fmt::layer()
            .$format()
            .with_writer($writer)
            .with_ansi($display.colors)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source);

        layer.with_timer($crate::format::make_timer())
    }};
}

/// Build a JSON fmt layer with the shared display options.
macro_rules! create_json_layer {
    ($display:expr, $writer:expr) => {{
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer($writer)
            .with_current_span(true)
            .flatten_event($display.flatten)
            .with_ansi(false)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source);

        layer.with_timer($crate::format::make_timer())
    }};
}
