use cvtxt_client::StreamEvent;

use crate::cmd::{install_ctrlc_handler, runtime, ConnectArgs, MessagesArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: MessagesArgs, connect: &ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let api = connect.api()?;
    let path = args.source.path(args.controller_id)?;
    let source = args.source.as_str();

    let mut stream = api.line_stream(&path, connect.api_key.as_deref());
    install_ctrlc_handler(stream.cancel_handle())?;

    runtime()?.block_on(async move {
        stream
            .start()
            .await
            .map_err(|err| client_error("stream start failed", err))?;
        tracing::debug!(path = %path, "following message stream");

        let mut printed = 0usize;
        let result = loop {
            match stream.next_event().await {
                Some(StreamEvent::Data(event)) => {
                    print_message(&event, source, format);
                    printed = printed.saturating_add(1);
                    if args.count.is_some_and(|count| printed >= count) {
                        break Ok(SUCCESS);
                    }
                }
                Some(StreamEvent::Closed) | None => break Ok(SUCCESS),
                Some(StreamEvent::Error(err)) => break Err(client_error("stream failed", err)),
            }
        };

        if let Err(err) = stream.stop().await {
            tracing::warn!(error = %err, "stream did not stop cleanly");
        }
        tracing::debug!(printed, status = %stream.status(), "message stream finished");
        result
    })
}
