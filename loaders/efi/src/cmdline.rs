use alloc::format;
use alloc::string::String;

use crate::env::Environment;

/// Assembles the kernel command line: the image path, the operator's
/// boot arguments, then `-B` properties for the boot filesystem and the
/// console selection. Properties the operator already spelled out are
/// left alone.
pub fn kernel_cmdline(image_name: &str, env: &Environment) -> String {
    let mut cmdline = String::from(image_name);

    if let Some(args) = env.boot_args() {
        if !args.is_empty() {
            cmdline.push(' ');
            cmdline.push_str(args);
        }
    }

    if let Some(bootfs) = env.zfs_bootfs() {
        if !cmdline.contains("zfs-bootfs=") {
            append_b_prop(&mut cmdline, &format!("zfs-bootfs={}", bootfs));
        }
    }

    if let Some(console) = env.os_console() {
        if !cmdline.contains("console=") {
            let mut prop = format!("console={}", console);
            if let Some(mode) = env.get(&format!("{}-mode", console)) {
                prop.push_str(&format!(",{}-mode=\"{}\"", console, mode));
            }
            append_b_prop(&mut cmdline, &prop);
        }
    }

    cmdline
}

/// Appends one property to the `-B` list, creating the list when the
/// command line has none yet.
fn append_b_prop(cmdline: &mut String, prop: &str) {
    if let Some(pos) = cmdline.find("-B ") {
        cmdline.insert_str(pos + 3, &format!("{},", prop));
    } else {
        cmdline.push_str(" -B ");
        cmdline.push_str(prop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIX: &str = "/platform/i86pc/kernel/amd64/unix";

    #[test]
    fn bare_image_name_when_nothing_is_configured() {
        let env = Environment::new();
        assert_eq!(kernel_cmdline(UNIX, &env), UNIX);
    }

    #[test]
    fn console_selection_creates_the_property_list() {
        let mut env = Environment::new();
        env.set("console", "ttya");

        assert_eq!(
            kernel_cmdline(UNIX, &env),
            format!("{} -B console=ttya", UNIX)
        );
    }

    #[test]
    fn console_mode_is_quoted_alongside() {
        let mut env = Environment::new();
        env.set("os_console", "ttya");
        env.set("ttya-mode", "115200,8,n,1,-");

        assert_eq!(
            kernel_cmdline(UNIX, &env),
            format!("{} -B console=ttya,ttya-mode=\"115200,8,n,1,-\"", UNIX)
        );
    }

    #[test]
    fn properties_join_an_existing_list() {
        let mut env = Environment::new();
        env.set("boot-args", "-v -B foo=bar");
        env.set("zfs-bootfs", "rpool/ROOT/a");
        env.set("console", "text");

        assert_eq!(
            kernel_cmdline(UNIX, &env),
            format!("{} -v -B console=text,zfs-bootfs=rpool/ROOT/a,foo=bar", UNIX)
        );
    }

    #[test]
    fn explicit_console_in_boot_args_wins() {
        let mut env = Environment::new();
        env.set("boot-args", "-B console=ttyb");
        env.set("os_console", "ttya");

        assert_eq!(
            kernel_cmdline(UNIX, &env),
            format!("{} -B console=ttyb", UNIX)
        );
    }
}
