use std::path::{Path, PathBuf};

use cvtxt_client::models::CameraConfig;
use cvtxt_client::{ControllerApi, FrameStream, StreamEvent, CAMERA_IMAGE_STREAM};

use crate::cmd::{install_ctrlc_handler, runtime, CameraArgs, ConnectArgs};
use crate::exit::{client_error, io_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: CameraArgs, connect: &ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let api = connect.api()?;
    if let Some(dir) = &args.out {
        std::fs::create_dir_all(dir).map_err(|err| io_error("cannot create output directory", err))?;
    }

    let mut stream = api.frame_stream(CAMERA_IMAGE_STREAM);
    install_ctrlc_handler(stream.cancel_handle())?;

    runtime()?.block_on(async move {
        if args.start {
            let config = CameraConfig {
                width: args.width,
                height: args.height,
                fps: args.fps,
                ..CameraConfig::default()
            };
            api.start_camera(&config)
                .await
                .map_err(|err| client_error("camera start failed", err))?;
            tracing::info!(width = config.width, height = config.height, fps = config.fps, "camera started");
        }

        let result = receive(&mut stream, &args, format).await;

        if let Err(err) = stream.stop().await {
            tracing::warn!(error = %err, "stream did not stop cleanly");
        }
        if args.start {
            stop_camera(&api).await;
        }
        result
    })
}

async fn receive(stream: &mut FrameStream, args: &CameraArgs, format: OutputFormat) -> CliResult<i32> {
    stream
        .start()
        .await
        .map_err(|err| client_error("image stream start failed", err))?;

    let mut received = 0u64;
    loop {
        match stream.next_event().await {
            Some(StreamEvent::Data(frame)) => {
                let saved = match &args.out {
                    Some(dir) => Some(save_frame(dir, received, &frame.payload)?),
                    None => None,
                };
                print_frame(&frame, received, saved.as_deref(), format);
                received += 1;
                if args.count.is_some_and(|count| received >= count) {
                    return Ok(SUCCESS);
                }
            }
            Some(StreamEvent::Closed) | None => {
                tracing::debug!(received, "image stream ended");
                return Ok(SUCCESS);
            }
            Some(StreamEvent::Error(err)) => return Err(client_error("image stream failed", err)),
        }
    }
}

async fn stop_camera(api: &ControllerApi) {
    match api.stop_camera().await {
        Ok(()) => tracing::info!("camera stopped"),
        Err(err) => tracing::warn!(error = %err, "camera stop failed"),
    }
}

fn save_frame(dir: &Path, index: u64, payload: &[u8]) -> CliResult<PathBuf> {
    let path = frame_path(dir, index);
    std::fs::write(&path, payload)
        .map_err(|err| io_error(&format!("cannot write {}", path.display()), err))?;
    Ok(path)
}

fn frame_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("frame-{index:06}.jpg"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_files_are_zero_padded() {
        assert_eq!(
            frame_path(Path::new("/tmp/cam"), 42),
            PathBuf::from("/tmp/cam/frame-000042.jpg")
        );
    }
}
