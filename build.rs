fn main() {
    // ── macOS: Bluetooth permission ───────────────────────────────────────────
    //
    // CoreBluetooth never reports the adapter as powered on for a bare CLI
    // binary unless it carries an Info.plist with
    // NSBluetoothAlwaysUsageDescription.  Linking the plist into the
    // `__TEXT,__info_plist` section is enough; no app bundle is needed.
    //
    // `CARGO_CFG_TARGET_OS` is the target, so this also applies when
    // cross-compiling for macOS.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("macos") {
        return;
    }

    let Ok(dir) = std::env::var("CARGO_MANIFEST_DIR") else {
        return;
    };
    let plist = format!("{dir}/Info.plist");

    for arg in ["-sectcreate", "__TEXT", "__info_plist", plist.as_str()] {
        println!("cargo:rustc-link-arg={arg}");
    }
    println!("cargo:rerun-if-changed=Info.plist");
}
