use crate::cmd::{runtime, ConnectArgs, ControllersArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_controllers, OutputFormat};

pub fn run(_args: ControllersArgs, connect: &ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let api = connect.api()?;
    let controllers = runtime()?
        .block_on(api.get_controllers())
        .map_err(|err| client_error("controller discovery failed", err))?;

    tracing::debug!(count = controllers.len(), "controllers discovered");
    print_controllers(&controllers, format);
    api.close();
    Ok(SUCCESS)
}
