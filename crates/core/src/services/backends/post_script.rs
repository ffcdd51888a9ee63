use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File name of the embedded post-script. Ghidra requires the Java class name
/// to match it.
pub const POST_SCRIPT_NAME: &str = "RecodeDecompileMain.java";

/// Ghidra post-script that decompiles `main` and the functions it references.
///
/// Usage:
/// `analyzeHeadless <project_dir> <project_name> -import <binary>
///  -scriptPath <script_dir> -postScript RecodeDecompileMain.java <output.c>`
pub fn post_script_source() -> &'static str {
    r#"// RecodeDecompileMain.java
// @category recode
// Decompiles main plus every non-libc function whose name appears in main's
// decompiled body. Output path comes from the first script argument.

import java.io.File;
import java.io.FileWriter;
import java.io.PrintWriter;
import java.util.Arrays;
import java.util.HashSet;
import java.util.LinkedHashSet;
import java.util.Set;

import ghidra.app.decompiler.DecompInterface;
import ghidra.app.decompiler.DecompileResults;
import ghidra.app.script.GhidraScript;
import ghidra.program.model.listing.Function;
import ghidra.program.model.listing.FunctionIterator;

public class RecodeDecompileMain extends GhidraScript {
    private static final Set<String> STDLIB = new HashSet<>(Arrays.asList(
        "printf", "scanf", "putchar", "exit", "malloc", "free", "puts", "__main"));
    // Zero disables the per-function decompiler timeout.
    private static final int DECOMPILE_TIMEOUT_SECS = 0;

    @Override
    protected void run() throws Exception {
        String outName = getScriptArgs().length > 0 ? getScriptArgs()[0] : "decompiled_output.c";
        File outFile = new File(outName);

        DecompInterface ifc = new DecompInterface();
        ifc.openProgram(currentProgram);

        Function main = null;
        FunctionIterator it = currentProgram.getFunctionManager().getFunctions(true);
        while (it.hasNext()) {
            Function f = it.next();
            if (f.getName().equals("main")) {
                main = f;
                break;
            }
        }
        if (main == null) {
            printerr("[recode] 'main' function not found");
            return;
        }

        DecompileResults mainRes = ifc.decompileFunction(main, DECOMPILE_TIMEOUT_SECS, monitor);
        if (mainRes == null || !mainRes.decompileCompleted() || mainRes.getDecompiledFunction() == null) {
            printerr("[recode] failed to decompile main");
            return;
        }
        String mainCode = mainRes.getDecompiledFunction().getC();

        Set<Function> relevant = new LinkedHashSet<>();
        relevant.add(main);
        FunctionIterator all = currentProgram.getFunctionManager().getFunctions(true);
        while (all.hasNext()) {
            Function f = all.next();
            String name = f.getName();
            if (STDLIB.contains(name) || relevant.contains(f)) {
                continue;
            }
            if (mainCode.contains(name)) {
                relevant.add(f);
            }
        }

        File parent = outFile.getAbsoluteFile().getParentFile();
        if (parent != null) {
            parent.mkdirs();
        }
        try (PrintWriter pw = new PrintWriter(new FileWriter(outFile))) {
            for (Function f : relevant) {
                DecompileResults res = ifc.decompileFunction(f, DECOMPILE_TIMEOUT_SECS, monitor);
                if (res != null && res.decompileCompleted() && res.getDecompiledFunction() != null) {
                    pw.println("// Function: " + f.getName());
                    pw.println(res.getDecompiledFunction().getC());
                    pw.println();
                } else {
                    pw.println("// Failed to decompile function: " + f.getName());
                    pw.println();
                }
            }
        }

        println("[recode] decompiled " + relevant.size() + " function(s) to " + outFile.getAbsolutePath());
    }
}
"#
}

/// Write the post-script into `dir`, creating the directory if needed.
pub fn install_post_script(dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(POST_SCRIPT_NAME);
    fs::write(&path, post_script_source())?;
    Ok(path)
}

/// Install the post-script only when `script_name` is the embedded script and
/// it is missing from `dir`. Returns whether a file was written.
///
/// A custom `script_name` is left for the operator to provide.
pub fn ensure_post_script(dir: &Path, script_name: &str) -> io::Result<bool> {
    if script_name != POST_SCRIPT_NAME || dir.join(script_name).is_file() {
        return Ok(false);
    }
    install_post_script(dir)?;
    tracing::info!(dir = %dir.display(), "installed Ghidra post-script");
    Ok(true)
}
