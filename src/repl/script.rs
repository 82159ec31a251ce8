//! Remote script generator.
//!
//! Builds the small MicroPython programs the shell runs in raw mode.
//! Every path or flag that ends up in program text goes through
//! [`py_str`] / [`py_bool`], so a quote, backslash or control byte in a
//! file name can never break the program (or, worse, smuggle a Ctrl-D
//! into the raw-mode input and execute half a program).

use core::fmt::Write as _;

/// Line separator the raw REPL expects.
const NL: &str = "\r\n";

/// Name of the remote file handle held open across upload chunks.
const UPLOAD_HANDLE: &str = "_rfs_f";

/// Appended to a target path to name its staged upload.
const STAGING_SUFFIX: &str = ".rfs-part";

/// Quote `s` as a single-quoted Python string literal.
pub fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

pub fn py_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

/// Line-oriented program builder.
#[derive(Debug, Default)]
pub struct Script {
    text: String,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// `import a, b`
    pub fn import(mut self, modules: &[&str]) -> Self {
        self.text.push_str("import ");
        self.text.push_str(&modules.join(", "));
        self.text.push_str(NL);
        self
    }

    /// Append one line of code. The caller is responsible for quoting
    /// any parameters with [`py_str`].
    pub fn line(mut self, code: &str) -> Self {
        self.text.push_str(code);
        self.text.push_str(NL);
        self
    }

    /// Append a multi-line block written with `\n` separators.
    pub fn block(mut self, code: &str) -> Self {
        for l in code.lines() {
            self.text.push_str(l);
            self.text.push_str(NL);
        }
        self
    }

    pub fn build(self) -> String {
        self.text
    }
}

// ── Queries ──────────────────────────────────────────────────

/// Free bytes on the filesystem holding `root`: `f_bsize * f_bfree`.
pub fn free_space(root: &str) -> String {
    Script::new()
        .import(&["uos", "usys"])
        .line(&format!("_s = uos.statvfs({})", py_str(root)))
        .line("usys.stdout.write(str(_s[0] * _s[3]))")
        .line("del(_s)")
        .build()
}

/// Stream a file as one base64 line per `chunk_size` bytes, ending with
/// the empty line `b2a_base64(b'')` produces.
pub fn read_chunked(path: &str, chunk_size: usize) -> String {
    Script::new()
        .import(&["ubinascii", "usys"])
        .line(&format!("with open({}, 'rb') as f:", py_str(path)))
        .line("  while True:")
        .line(&format!("    c = ubinascii.b2a_base64(f.read({chunk_size}))"))
        .line("    usys.stdout.write(c)")
        .line("    if not len(c) or c == b'\\n':")
        .line("        break")
        .build()
}

/// Inflate a zlib-compressed remote file in place.
pub fn decompress(path: &str) -> String {
    Script::new()
        .import(&["uzlib"])
        .block(
            "def _rfs_inflate(name):\n\
             \x20 with open(name, 'rb+') as d:\n\
             \x20   c = uzlib.decompress(d.read())\n\
             \x20 with open(name, 'wb') as d:\n\
             \x20   d.write(c)\n\
             \x20 del(c)",
        )
        .line(&format!("_rfs_inflate({})", py_str(path)))
        .build()
}

/// Walk `root` and print a JSON array of entry records, or `null` when
/// `root` itself cannot be listed.
///
/// Record fields: `Path`, `Name`, `Size`, `Type` (`dir` / `file` /
/// `OSError`), `Hash` (files only, when requested), `OSError` (errno,
/// error entries only) and `Fullname`.
pub fn list_dir(root: &str, recursive: bool, hash: bool) -> String {
    Script::new()
        .import(&["os", "json"])
        .import(&["uhashlib", "ubinascii"])
        .line(&format!("_rfs_root = {}", py_str(root)))
        .line(&format!("_rfs_sub = {}", py_bool(recursive)))
        .line(&format!("_rfs_hash = {}", py_bool(hash)))
        .block(
            "def _rfs_ls(path, sub, gethash):\n\
             \x20   li = []\n\
             \x20   for name in os.listdir(path):\n\
             \x20       info = {'Path': path, 'Name': name, 'Size': 0}\n\
             \x20       full = path + name if path[-1] == '/' else path + '/' + name\n\
             \x20       below = []\n\
             \x20       try:\n\
             \x20           st = os.stat(full)\n\
             \x20           if st[0] & 0x4000:\n\
             \x20               info['Type'] = 'dir'\n\
             \x20               if sub:\n\
             \x20                   below = _rfs_ls(full, True, gethash)\n\
             \x20           else:\n\
             \x20               info['Size'] = st[6]\n\
             \x20               info['Type'] = 'file'\n\
             \x20               if gethash:\n\
             \x20                   with open(full, 'rb') as f:\n\
             \x20                       h = uhashlib.sha256(f.read())\n\
             \x20                   info['Hash'] = ubinascii.hexlify(h.digest()).decode()\n\
             \x20       except OSError as e:\n\
             \x20           info['OSError'] = e.args[0]\n\
             \x20           info['Type'] = 'OSError'\n\
             \x20       info['Fullname'] = full\n\
             \x20       li.append(info)\n\
             \x20       li = li + below\n\
             \x20   return li\n\
             try:\n\
             \x20   _rfs_out = json.dumps(_rfs_ls(_rfs_root, _rfs_sub, _rfs_hash))\n\
             except OSError:\n\
             \x20   _rfs_out = 'null'\n\
             print(_rfs_out)",
        )
        .build()
}

// ── Mutations ────────────────────────────────────────────────

/// Path prefixes to create so that `file_path`'s parent exists, from
/// shallowest to deepest. `/a/b/c.txt` → `["/a", "/a/b"]`.
pub fn parent_prefixes(file_path: &str) -> Vec<String> {
    let mut parts: Vec<&str> = file_path.split('/').collect();
    parts.pop();

    let mut prefixes = Vec::new();
    for i in 1..=parts.len() {
        if parts[i - 1].is_empty() {
            continue;
        }
        prefixes.push(parts[..i].join("/"));
    }
    prefixes
}

/// One guarded `mkdir` per parent prefix of `file_path`; "already
/// exists" is not an error. `None` when there is nothing to create.
pub fn ensure_parent_dirs(file_path: &str) -> Option<String> {
    let prefixes = parent_prefixes(file_path);
    if prefixes.is_empty() {
        return None;
    }

    let mut script = Script::new().import(&["uos"]).block(
        "def _rfs_mkdir(folder):\n\
         \x20 try:\n\
         \x20   uos.mkdir(folder)\n\
         \x20 except OSError:\n\
         \x20   pass",
    );
    for prefix in &prefixes {
        script = script.line(&format!("_rfs_mkdir({})", py_str(prefix)));
    }
    Some(script.build())
}

/// Single-call `uos` primitive on one path (`remove`, `mkdir`, `chdir`,
/// `rmdir`).
pub fn os_call(primitive: &str, path: &str) -> String {
    Script::new()
        .import(&["uos"])
        .line(&format!("uos.{primitive}({})", py_str(path)))
        .build()
}

pub fn rename(old: &str, new: &str) -> String {
    Script::new()
        .import(&["uos"])
        .line(&format!("uos.rename({}, {})", py_str(old), py_str(new)))
        .build()
}

pub fn reboot() -> String {
    Script::new().import(&["machine"]).line("machine.reset()").build()
}

/// Open `path` for writing and keep the handle for the chunks that follow.
pub fn open_upload(path: &str) -> String {
    Script::new()
        .line(&format!("{UPLOAD_HANDLE} = open({}, 'wb')", py_str(path)))
        .build()
}

/// Append one base64-encoded chunk to the open upload handle.
pub fn write_chunk(encoded: &str) -> String {
    Script::new()
        .import(&["ubinascii"])
        .line(&format!(
            "{UPLOAD_HANDLE}.write(ubinascii.a2b_base64({}))",
            py_str(encoded)
        ))
        .build()
}

pub fn close_upload() -> String {
    Script::new()
        .line(&format!("{UPLOAD_HANDLE}.close()"))
        .line(&format!("del({UPLOAD_HANDLE})"))
        .build()
}

/// Sibling path an upload is staged in before it replaces `path`.
pub fn staging_path(path: &str) -> String {
    format!("{path}{STAGING_SUFFIX}")
}

/// Close the upload handle if it is still open and delete the staged
/// file. Safe to run whatever state the upload stopped in.
pub fn abort_upload(staging: &str) -> String {
    Script::new()
        .import(&["uos"])
        .block(&format!(
            "try:\n\
             \x20 {UPLOAD_HANDLE}.close()\n\
             \x20 del({UPLOAD_HANDLE})\n\
             except NameError:\n\
             \x20 pass"
        ))
        .block(&format!(
            "try:\n\
             \x20 uos.remove({})\n\
             except OSError:\n\
             \x20 pass",
            py_str(staging)
        ))
        .build()
}

/// Move `staging` over `target`, removing an existing `target` first
/// (FAT refuses to rename onto an existing file).
pub fn replace(staging: &str, target: &str) -> String {
    Script::new()
        .import(&["uos"])
        .block(&format!(
            "try:\n\
             \x20 uos.remove({})\n\
             except OSError:\n\
             \x20 pass",
            py_str(target)
        ))
        .line(&format!(
            "uos.rename({}, {})",
            py_str(staging),
            py_str(target)
        ))
        .build()
}

// ── Tests ────────────────────────────────────────────────────
