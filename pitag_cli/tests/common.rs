use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn pitag_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("pitag"));
	cmd.env("NO_COLOR", "1").env_remove("PITAG_LOG");
	cmd
}
